use log::LevelFilter;
use structopt::StructOpt;

use ekncontent::domain::Domain;
use ekncontent::error::Error;
use ekncontent::query::Query;
use ekncontent::utils;

#[macro_use]
extern crate log;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // set default log level to info
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Info);
    builder.parse_env("RUST_LOG");
    builder.init();

    let opt = cli::Ekncontent::from_args();
    debug!("cli args\n{:#?}", opt);

    match opt {
        cli::Ekncontent::Query(q) => {
            let domain =
                Domain::for_app_id("", Some(q.path.as_path()), &utils::current_language(), None)
                    .await?;
            let query = Query::builder()
                .search_terms(q.terms)
                .tags_match_all(q.tags)
                .limit(q.limit.unwrap_or(10))
                .build();

            let query = if query.search_terms().is_empty() {
                query
            } else {
                domain.fixed_query(&query, None).await?
            };
            let results = domain.query(&query, None).await?;

            info!(
                "{} results (upper bound: {})",
                results.len(),
                results.upper_bound()
            );
            for model in results.models() {
                println!("{}\t{}", model.id(), model.title());
            }
        }

        cli::Ekncontent::Get(g) => {
            let domain =
                Domain::for_app_id("", Some(g.path.as_path()), &utils::current_language(), None)
                    .await?;
            let model = domain.object(&g.uri, None).await?;
            println!("{:#}", model.to_json());
        }

        cli::Ekncontent::Link(l) => {
            let domain =
                Domain::for_app_id("", Some(l.path.as_path()), &utils::current_language(), None)
                    .await?;
            match domain.test_link(&l.link, None).await? {
                Some(uri) => println!("{uri}"),
                None => warn!("no content matches {}", l.link),
            }
        }
    };
    Ok(())
}
