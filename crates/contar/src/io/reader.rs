//! Binary reader
//!
//! Decoding never panics and never throws away work: the first problem stops
//! the decoder, is logged, and is returned next to everything decoded so far.

use super::{check_version, Decoder, DictionaryTable, MAGIC};
use crate::class::descriptor::{desc_from_tokens, METHOD_ID_SEPARATOR, TOKENIZED_METHOD_ID_VERSION};
use crate::data::{lock_class, ProjectData};
use crate::result::{ContarError, ContarResult};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Result of decoding a coverage file
#[derive(Debug)]
pub struct LoadReport {
    /// Everything decoded before `error`, or the whole file
    pub project: ProjectData,
    /// The problem that stopped decoding, if any
    pub error: Option<ContarError>,
}

impl LoadReport {
    /// Whether the whole input was decoded
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// The project if decoding finished, otherwise the error
    pub fn into_result(self) -> ContarResult<ProjectData> {
        match self.error {
            None => Ok(self.project),
            Some(e) => Err(e),
        }
    }
}

fn signature_from_tokens(tokens: &[String], version: u32) -> String {
    if version < TOKENIZED_METHOD_ID_VERSION {
        let combined = tokens.concat();
        return match combined.split_once(METHOD_ID_SEPARATOR) {
            Some((name, desc)) if desc.starts_with('(') => format!("{name}{desc}"),
            _ => combined,
        };
    }
    desc_from_tokens(tokens).unwrap_or_else(|| tokens.concat())
}

fn decode_into(dec: &mut Decoder<'_>, project: &ProjectData) -> ContarResult<()> {
    let magic = dec.read_bytes(MAGIC.len(), "magic")?;
    if magic != MAGIC {
        return Err(ContarError::invalid("not a coverage data file"));
    }
    let version = dec.read_u32("version")?;
    check_version(version)?;

    let dict_len = dec.read_count("dictionary", 1)?;
    let mut strings = Vec::with_capacity(dict_len);
    for _ in 0..dict_len {
        strings.push(dec.read_str("dictionary entry")?);
    }
    let dict = DictionaryTable::new(strings);

    let class_count = dec.read_count("classes", 2)?;
    for _ in 0..class_count {
        let name = dict.resolve(dec.read_u32("class name")?, "class name")?.to_string();
        let handle = project.get_or_create_class_data(&name);
        let method_count = dec.read_count("methods", 2)?;
        for _ in 0..method_count {
            let token_count = if version >= TOKENIZED_METHOD_ID_VERSION {
                dec.read_count("method id", 1)?
            } else {
                1
            };
            let mut tokens = Vec::with_capacity(token_count);
            for _ in 0..token_count {
                tokens.push(dict.resolve(dec.read_u32("method id")?, "method id")?.to_string());
            }
            let signature = signature_from_tokens(&tokens, version);

            let line_count = dec.read_count("lines", 3)?;
            for _ in 0..line_count {
                let number = dec.read_u32("line number")?;
                let test_ref = dec.read_u32("test name")?;
                let test_name = match test_ref.checked_sub(1) {
                    Some(id) => Some(dict.resolve(id, "test name")?.to_string()),
                    None => None,
                };
                let hits = dec.read_u32("line hits")?;

                let mut class = lock_class(&handle);
                let line = class.get_or_create_line(number, &signature);
                line.set_hits(hits);
                if let Some(name) = &test_name {
                    line.set_test_name(name);
                }
                if hits > 0 {
                    let jumps = dec.read_count("jumps", 2)?;
                    for index in 0..jumps {
                        line.set_true_hits(index, dec.read_u32("jump hits")?);
                        line.set_false_hits(index, dec.read_u32("jump hits")?);
                    }
                    let switches = dec.read_count("switches", 2)?;
                    for index in 0..switches {
                        let default_hits = dec.read_u32("switch default hits")?;
                        let key_count = dec.read_count("switch keys", 2)?;
                        let mut keys = Vec::with_capacity(key_count);
                        let mut key_hits = Vec::with_capacity(key_count);
                        for _ in 0..key_count {
                            keys.push(dec.read_i32("switch key")?);
                            key_hits.push(dec.read_u32("switch hits")?);
                        }
                        line.set_default_hits(index, &keys, default_hits);
                        line.set_switch_hits(index, &keys, &key_hits);
                    }
                }
                class.register_method_signature(number);
            }
        }
    }

    if dec.remaining() > 0 {
        return Err(ContarError::invalid(format!(
            "{} trailing bytes after class data",
            dec.remaining()
        )));
    }
    Ok(())
}

/// Decode coverage data from bytes
#[must_use]
pub fn decode(bytes: &[u8]) -> LoadReport {
    let project = ProjectData::new();
    let mut dec = Decoder::new(bytes);
    let error = decode_into(&mut dec, &project).err();
    match &error {
        Some(e) => warn!(
            offset = dec.position(),
            classes = project.class_count(),
            error = %e,
            "coverage data decoded partially"
        ),
        None => debug!(classes = project.class_count(), "coverage data decoded"),
    }
    LoadReport { project, error }
}

/// Read and decode coverage data from `reader`
pub fn read_project<R: Read>(mut reader: R) -> LoadReport {
    let mut bytes = Vec::new();
    if let Err(e) = reader.read_to_end(&mut bytes) {
        warn!(error = %e, "failed to read coverage data");
        return LoadReport {
            project: ProjectData::new(),
            error: Some(e.into()),
        };
    }
    decode(&bytes)
}

/// Load coverage data from the file at `path`
pub fn load(path: &Path) -> LoadReport {
    match fs::read(path) {
        Ok(bytes) => decode(&bytes),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to open coverage data");
            LoadReport {
                project: ProjectData::new(),
                error: Some(e.into()),
            }
        }
    }
}
