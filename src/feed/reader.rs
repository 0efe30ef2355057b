//! Streaming attribute reader for classifier XML documents.
//!
//! Each element is decoded into a [`Record`] and released before the next one
//! is read, so memory use does not grow with document size.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};

/// Attributes of one feed element. An absent attribute is `None`, an empty one `Some("")`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// Byte offset of the element in the document
    pub position: u64,
    attrs: HashMap<String, String>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn get_owned(&self, name: &str) -> Option<String> {
        self.attrs.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    fn from_element(element: &BytesStart<'_>, decoder: Decoder, position: u64) -> Result<Self> {
        let mut attrs = HashMap::new();
        for attr in element.attributes() {
            let attr = attr.map_err(|e| Error::FeedFormat {
                position,
                message: e.to_string(),
            })?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .decode_and_unescape_value(decoder)
                .map_err(|e| Error::FeedFormat {
                    position,
                    message: e.to_string(),
                })?
                .into_owned();
            attrs.insert(key, value);
        }
        Ok(Self { position, attrs })
    }

    #[cfg(test)]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            position: 0,
            attrs: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Lazy sequence of the records in a document that satisfy a predicate
pub struct XmlRecords<R: BufRead, P> {
    reader: Reader<R>,
    buf: Vec<u8>,
    predicate: P,
    elements_seen: u64,
    done: bool,
}

impl<R: BufRead, P: FnMut(&Record) -> bool> XmlRecords<R, P> {
    pub fn new(source: R, predicate: P) -> Self {
        Self {
            reader: Reader::from_reader(source),
            buf: Vec::with_capacity(1024),
            predicate,
            elements_seen: 0,
            done: false,
        }
    }

    /// Elements visited so far, qualifying or not
    pub fn elements_seen(&self) -> u64 {
        self.elements_seen
    }
}

impl<P: FnMut(&Record) -> bool> XmlRecords<Box<dyn BufRead>, P> {
    /// Open a feed document from disk; `.gz` files are decompressed on the fly
    pub fn open(path: &Path, predicate: P) -> Result<Self> {
        Ok(Self::new(open_document(path)?, predicate))
    }
}

impl<R: BufRead, P: FnMut(&Record) -> bool> Iterator for XmlRecords<R, P> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            self.buf.clear();
            let position = self.reader.buffer_position() as u64;
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => {
                    self.done = true;
                    return Some(Err(Error::FeedFormat {
                        position,
                        message: e.to_string(),
                    }));
                }
            };

            match event {
                Event::Start(ref element) | Event::Empty(ref element) => {
                    self.elements_seen += 1;
                    let record =
                        match Record::from_element(element, self.reader.decoder(), position) {
                            Ok(record) => record,
                            Err(e) => {
                                self.done = true;
                                return Some(Err(e));
                            }
                        };
                    if (self.predicate)(&record) {
                        return Some(Ok(record));
                    }
                }
                Event::Eof => {
                    self.done = true;
                    return None;
                }
                _ => {}
            }
        }
    }
}

/// Open a document for streaming, decompressing `.gz` files
pub fn open_document(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}
