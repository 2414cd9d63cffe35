//! Command line arguments and parameters management/parsing.
use std::path::PathBuf;

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "ekncontent",
    about = "Query and fetch content from knowledge app shard bundles"
)]
/// Holds every command that is callable by the `ekncontent` command.
pub enum Ekncontent {
    #[structopt(about = "Run a full-text query against a content directory")]
    Query(Query),
    #[structopt(about = "Fetch one object by its ekn URI")]
    Get(Get),
    #[structopt(about = "Resolve an external link against the link tables")]
    Link(Link),
}

#[derive(Debug, StructOpt)]
/// Query command and parameters.
pub struct Query {
    #[structopt(parse(from_os_str), help = "content directory (holds manifest.json)")]
    pub path: PathBuf,
    #[structopt(help = "free-text search terms")]
    pub terms: String,
    #[structopt(short = "l", help = "maximum number of results. Default is 10.")]
    pub limit: Option<u32>,
    #[structopt(short = "t", long = "tag", help = "only match objects carrying this tag")]
    pub tags: Vec<String>,
}

#[derive(Debug, StructOpt)]
/// Get command and parameters.
pub struct Get {
    #[structopt(parse(from_os_str), help = "content directory (holds manifest.json)")]
    pub path: PathBuf,
    #[structopt(help = "ekn URI of the object")]
    pub uri: String,
}

#[derive(Debug, StructOpt)]
/// Link command and parameters.
pub struct Link {
    #[structopt(parse(from_os_str), help = "content directory (holds manifest.json)")]
    pub path: PathBuf,
    #[structopt(help = "external URL to look up")]
    pub link: String,
}
