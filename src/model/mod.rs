/*! Typed content objects parsed from per-record metadata.

A metadata document is a JSON object carrying an `@type` discriminator from
the closed `ekn://_vocab/` vocabulary. [`Model::from_json`] dispatches on it
and materializes the matching variant; unknown discriminators, a missing
`@type` or a non-object root fail with
[`BadFormat`](crate::error::Error::BadFormat). Unknown extra fields are
tolerated and dropped.

This module is the only place where external field names (`originalURI`,
`childTags`, ...) are bound to internal property names; everything
downstream uses the typed structs.
!*/
mod article;
mod audio;
mod content;
mod dictionary_entry;
mod image;
mod media;
mod set;
mod video;

pub use article::Article;
pub use audio::Audio;
pub use content::{Content, SEQUENCE_NUMBER_UNSET};
pub use dictionary_entry::DictionaryEntry;
pub use image::Image;
pub use media::Media;
pub use set::Set;
pub use video::Video;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

pub const CONTENT_OBJECT: &str = "ekn://_vocab/ContentObject";
pub const ARTICLE_OBJECT: &str = "ekn://_vocab/ArticleObject";
pub const DICTIONARY_OBJECT: &str = "ekn://_vocab/DictionaryObject";
pub const SET_OBJECT: &str = "ekn://_vocab/SetObject";
pub const MEDIA_OBJECT: &str = "ekn://_vocab/MediaObject";
pub const IMAGE_OBJECT: &str = "ekn://_vocab/ImageObject";
pub const VIDEO_OBJECT: &str = "ekn://_vocab/VideoObject";
pub const AUDIO_OBJECT: &str = "ekn://_vocab/AudioObject";

/// One content object of any variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    Content(Content),
    Article(Article),
    DictionaryEntry(DictionaryEntry),
    Set(Set),
    Media(Media),
    Image(Image),
    Video(Video),
    Audio(Audio),
}

fn parse<T: DeserializeOwned>(node: &Value) -> Result<T, Error> {
    serde_json::from_value(node.clone()).map_err(|e| Error::BadFormat(e.to_string()))
}

fn dump<T: Serialize>(value: &T, discriminator: &str) -> Value {
    // serializing these structs cannot fail, they are maps of plain values
    let mut node = serde_json::to_value(value).unwrap_or(Value::Null);
    if let Some(object) = node.as_object_mut() {
        object.insert("@type".to_string(), Value::String(discriminator.to_string()));
    }
    node
}

impl Model {
    /// Materializes a typed model from a metadata document.
    pub fn from_json(node: &Value) -> Result<Model, Error> {
        let object = node.as_object().ok_or_else(|| {
            Error::BadFormat("trying to instantiate an object model from a non JSON object".into())
        })?;

        let type_node = object
            .get("@type")
            .ok_or_else(|| Error::BadFormat("object model JSON has no @type field".into()))?;
        let discriminator = type_node
            .as_str()
            .ok_or_else(|| Error::BadFormat("unexpected value type for @type field".into()))?;

        let mut model = match discriminator {
            CONTENT_OBJECT => Model::Content(parse(node)?),
            ARTICLE_OBJECT => Model::Article(parse(node)?),
            DICTIONARY_OBJECT => Model::DictionaryEntry(parse(node)?),
            SET_OBJECT => Model::Set(parse(node)?),
            MEDIA_OBJECT => Model::Media(parse(node)?),
            IMAGE_OBJECT => Model::Image(parse(node)?),
            VIDEO_OBJECT => Model::Video(parse(node)?),
            AUDIO_OBJECT => Model::Audio(parse(node)?),
            other => {
                return Err(Error::BadFormat(format!(
                    "unknown value for @type field {other}"
                )))
            }
        };

        if model.content().id.is_empty() {
            model.content_mut().id = content::synthetic_id();
        }

        Ok(model)
    }

    /// Re-serializes the internal properties, `@type` included.
    pub fn to_json(&self) -> Value {
        match self {
            Model::Content(m) => dump(m, CONTENT_OBJECT),
            Model::Article(m) => dump(m, ARTICLE_OBJECT),
            Model::DictionaryEntry(m) => dump(m, DICTIONARY_OBJECT),
            Model::Set(m) => dump(m, SET_OBJECT),
            Model::Media(m) => dump(m, MEDIA_OBJECT),
            Model::Image(m) => dump(m, IMAGE_OBJECT),
            Model::Video(m) => dump(m, VIDEO_OBJECT),
            Model::Audio(m) => dump(m, AUDIO_OBJECT),
        }
    }

    pub fn discriminator(&self) -> &'static str {
        match self {
            Model::Content(_) => CONTENT_OBJECT,
            Model::Article(_) => ARTICLE_OBJECT,
            Model::DictionaryEntry(_) => DICTIONARY_OBJECT,
            Model::Set(_) => SET_OBJECT,
            Model::Media(_) => MEDIA_OBJECT,
            Model::Image(_) => IMAGE_OBJECT,
            Model::Video(_) => VIDEO_OBJECT,
            Model::Audio(_) => AUDIO_OBJECT,
        }
    }

    /// The shared base property bag of any variant.
    pub fn content(&self) -> &Content {
        match self {
            Model::Content(m) => m,
            Model::Article(m) => &m.content,
            Model::DictionaryEntry(m) => &m.content,
            Model::Set(m) => &m.content,
            Model::Media(m) => &m.content,
            Model::Image(m) => &m.media.content,
            Model::Video(m) => &m.media.content,
            Model::Audio(m) => &m.media.content,
        }
    }

    fn content_mut(&mut self) -> &mut Content {
        match self {
            Model::Content(m) => m,
            Model::Article(m) => &mut m.content,
            Model::DictionaryEntry(m) => &mut m.content,
            Model::Set(m) => &mut m.content,
            Model::Media(m) => &mut m.content,
            Model::Image(m) => &mut m.media.content,
            Model::Video(m) => &mut m.media.content,
            Model::Audio(m) => &mut m.media.content,
        }
    }

    pub fn id(&self) -> &str {
        &self.content().id
    }

    pub fn title(&self) -> &str {
        &self.content().title
    }

    pub fn tags(&self) -> &[String] {
        &self.content().tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::is_valid_id;
    use serde_json::json;

    fn article_node() -> Value {
        json!({
            "@type": ARTICLE_OBJECT,
            "@id": "ekn:///4dba9091495e8f277893e0d400e9e092f9f6f551",
            "title": "Apple",
            "originalTitle": "Apple (fruit)",
            "originalURI": "https://en.wikipedia.org/wiki/Apple",
            "contentType": "text/html",
            "language": "en",
            "copyrightHolder": "Wikipedia",
            "sourceURI": "https://en.wikipedia.org/wiki/Apple",
            "synopsis": "The apple is a pomaceous fruit.",
            "lastModifiedDate": "2016-04-07T09:28:42Z",
            "license": "CC-BY-SA 3.0",
            "thumbnail": "ekn:///1111111111111111111111111111111111111111",
            "featured": true,
            "canPrint": false,
            "tags": ["fruit", "EknArticleObject"],
            "resources": ["ekn:///2222222222222222222222222222222222222222"],
            "sequenceNumber": 4,
            "authors": ["Johnny Appleseed"],
            "temporalCoverage": ["2016"],
            "outgoingLinks": ["ekn:///3333333333333333333333333333333333333333"],
            "tableOfContents": [{"hasIndex": 0, "hasLabel": "Overview"}],
            "someUnknownField": {"nested": true}
        })
    }

    #[test]
    fn parses_article_fields() {
        let model = Model::from_json(&article_node()).unwrap();
        let article = match &model {
            Model::Article(a) => a,
            other => panic!("expected an article, got {other:?}"),
        };
        assert_eq!(article.content.title, "Apple");
        assert_eq!(article.content.original_title, "Apple (fruit)");
        assert_eq!(article.content.content_type, "text/html");
        assert!(article.content.featured);
        assert!(!article.content.can_print);
        // canExport absent, defaults to true
        assert!(article.content.can_export);
        assert_eq!(article.content.sequence_number, 4);
        assert_eq!(article.authors, vec!["Johnny Appleseed"]);
        assert_eq!(article.temporal_coverage, vec!["2016"]);
        assert_eq!(
            article.outgoing_links,
            vec!["ekn:///3333333333333333333333333333333333333333"]
        );
        assert!(article.table_of_contents.is_some());
        assert!(is_valid_id(model.id()));
    }

    #[test]
    fn defaults_for_missing_fields() {
        let node = json!({
            "@type": CONTENT_OBJECT,
            "@id": "ekn:///4dba9091495e8f277893e0d400e9e092f9f6f551",
        });
        let model = Model::from_json(&node).unwrap();
        let content = model.content();
        assert_eq!(content.title, "");
        assert!(content.can_print);
        assert!(content.can_export);
        assert!(!content.featured);
        assert_eq!(content.sequence_number, SEQUENCE_NUMBER_UNSET);
        assert!(content.tags.is_empty());
    }

    #[test]
    fn empty_id_gets_synthetic_one() {
        let node = json!({"@type": CONTENT_OBJECT, "title": "No id"});
        let model = Model::from_json(&node).unwrap();
        assert!(is_valid_id(model.id()));
    }

    #[test]
    fn unknown_type_is_bad_format() {
        let node = json!({"@type": "ekn://_vocab/WidgetObject"});
        assert!(matches!(
            Model::from_json(&node),
            Err(crate::error::Error::BadFormat(_))
        ));
    }

    #[test]
    fn missing_type_is_bad_format() {
        let node = json!({"@id": "ekn:///4dba9091495e8f277893e0d400e9e092f9f6f551"});
        assert!(matches!(
            Model::from_json(&node),
            Err(crate::error::Error::BadFormat(_))
        ));
    }

    #[test]
    fn non_object_root_is_bad_format() {
        assert!(matches!(
            Model::from_json(&json!(["not", "an", "object"])),
            Err(crate::error::Error::BadFormat(_))
        ));
        assert!(matches!(
            Model::from_json(&json!("string")),
            Err(crate::error::Error::BadFormat(_))
        ));
    }

    #[test]
    fn media_variants() {
        let node = json!({
            "@type": VIDEO_OBJECT,
            "@id": "ekn:///5555555555555555555555555555555555555555",
            "title": "Apple harvest",
            "caption": "Harvesting apples in fall",
            "width": 1920,
            "height": 1080,
            "parent": "ekn:///4dba9091495e8f277893e0d400e9e092f9f6f551",
            "duration": 95,
            "transcript": "We pick apples.",
            "poster": "ekn:///6666666666666666666666666666666666666666"
        });
        let model = Model::from_json(&node).unwrap();
        let video = match &model {
            Model::Video(v) => v,
            other => panic!("expected a video, got {other:?}"),
        };
        assert_eq!(video.media.caption, "Harvesting apples in fall");
        assert_eq!(video.media.width, 1920);
        assert_eq!(
            video.media.parent_uri.as_deref(),
            Some("ekn:///4dba9091495e8f277893e0d400e9e092f9f6f551")
        );
        assert_eq!(video.duration, 95);
        assert_eq!(
            video.poster_uri,
            "ekn:///6666666666666666666666666666666666666666"
        );
    }

    #[test]
    fn set_child_tags() {
        let node = json!({
            "@type": SET_OBJECT,
            "@id": "ekn:///7777777777777777777777777777777777777777",
            "title": "Fruit",
            "childTags": ["fruit", "orchard"]
        });
        let model = Model::from_json(&node).unwrap();
        match model {
            Model::Set(set) => assert_eq!(set.child_tags, vec!["fruit", "orchard"]),
            other => panic!("expected a set, got {other:?}"),
        }
    }

    #[test]
    fn reserialize_roundtrip_is_stable() {
        let first = Model::from_json(&article_node()).unwrap();
        let second = Model::from_json(&first.to_json()).unwrap();
        // unknown extra fields are gone, everything else survives untouched
        assert_eq!(first, second);
        assert_eq!(first.to_json(), second.to_json());
    }
}
