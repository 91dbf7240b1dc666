//! Annotated tag object
//!
//! ```text
//! tag <size>\0
//! object <target-sha>
//! type <target-type>
//! tag <name>
//! tagger <name> <email> <timestamp> <timezone>
//!
//! <message>
//! ```

use crate::artifacts::objects::commit::Author;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use derive_new::new;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Tag {
    target: ObjectId,
    target_type: ObjectType,
    name: String,
    tagger: Option<Author>,
    message: String,
}

impl Tag {
    pub fn target(&self) -> &ObjectId {
        &self.target
    }

    pub fn target_type(&self) -> ObjectType {
        self.target_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tagger(&self) -> Option<&Author> {
        self.tagger.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn payload(&self) -> String {
        let mut payload = format!(
            "object {}\ntype {}\ntag {}\n",
            self.target, self.target_type, self.name
        );
        if let Some(tagger) = &self.tagger {
            payload.push_str(&format!("tagger {}\n", tagger.display()));
        }
        payload.push('\n');
        payload.push_str(&self.message);

        payload
    }
}

impl Packable for Tag {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        Ok(frame(self.object_type(), self.payload().as_bytes()))
    }
}

impl Unpackable for Tag {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;
        let content = String::from_utf8_lossy(&content);
        let (headers, message) = content
            .split_once("\n\n")
            .unwrap_or((content.as_ref(), ""));

        let mut target = None;
        let mut target_type = None;
        let mut name = None;
        let mut tagger = None;

        for line in headers.lines() {
            if let Some(value) = line.strip_prefix("object ") {
                target = Some(ObjectId::try_parse(value.to_string())?);
            } else if let Some(value) = line.strip_prefix("type ") {
                target_type = Some(ObjectType::try_from(value)?);
            } else if let Some(value) = line.strip_prefix("tag ") {
                name = Some(value.to_string());
            } else if let Some(value) = line.strip_prefix("tagger ") {
                tagger = Some(Author::try_from(value)?);
            }
        }

        Ok(Tag::new(
            target.context("Invalid tag object: missing object line")?,
            target_type.context("Invalid tag object: missing type line")?,
            name.context("Invalid tag object: missing tag line")?,
            tagger,
            message.to_string(),
        ))
    }
}

impl Object for Tag {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn display(&self) -> String {
        self.payload()
    }
}
