use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::RepositoryError;

/// What `cat-file` reports about an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatFileMode {
    /// `-p`: pretty-print the content
    Pretty,
    /// `-t`: the object type
    Type,
    /// `-s`: the content size in bytes
    Size,
    /// `-e`: exit status only
    Exists,
}

impl Repository {
    pub fn cat_file(&mut self, object: &str, mode: CatFileMode) -> anyhow::Result<()> {
        let oid = match Revision::try_parse(object)?.resolve_object(self) {
            Ok(oid) => oid,
            Err(_) if mode == CatFileMode::Exists => {
                Err(RepositoryError::ObjectNotFound(object.to_string()))?
            }
            Err(err) => return Err(err),
        };

        match mode {
            CatFileMode::Exists => {}
            CatFileMode::Type => {
                let object_type = self.database().get_object_type(&oid)?;
                writeln!(self.writer(), "{object_type}")?;
            }
            CatFileMode::Size => {
                let framed = self.database().load(&oid)?;
                let (_, size) = ObjectType::parse_header(&mut framed.as_ref())?;
                writeln!(self.writer(), "{size}")?;
            }
            CatFileMode::Pretty => match self.database().parse_object(&oid)? {
                ObjectBox::Blob(blob) => self.writer().write_all(blob.content())?,
                ObjectBox::Tree(tree) => {
                    let listing = ObjectBox::Tree(tree).display();
                    if !listing.is_empty() {
                        writeln!(self.writer(), "{listing}")?;
                    }
                }
                other => write!(self.writer(), "{}", other.display())?,
            },
        }

        Ok(())
    }
}
