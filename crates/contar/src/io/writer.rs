//! Binary writer

use super::{check_version, Dictionary, Encoder, MAGIC};
use crate::class::descriptor::{method_id, split_signature, TOKENIZED_METHOD_ID_VERSION};
use crate::data::{lock_class, LineData, ProjectData};
use crate::result::ContarResult;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

struct MethodSnapshot {
    tokens: Vec<String>,
    lines: Vec<LineData>,
}

struct ClassSnapshot {
    name: String,
    methods: Vec<MethodSnapshot>,
}

fn signature_tokens(signature: &str, version: u32) -> Vec<String> {
    match split_signature(signature) {
        Some((name, desc)) => method_id(name, desc, version),
        None => vec![signature.to_string()],
    }
}

fn snapshot(project: &ProjectData, version: u32) -> Vec<ClassSnapshot> {
    project
        .class_names()
        .into_iter()
        .filter_map(|name| {
            let handle = project.class_data(&name)?;
            let class = lock_class(&handle);
            let mut grouped: BTreeMap<&str, Vec<LineData>> = BTreeMap::new();
            for line in class.lines() {
                grouped
                    .entry(line.method_signature())
                    .or_default()
                    .push(line.clone());
            }
            let methods = grouped
                .into_iter()
                .map(|(signature, lines)| MethodSnapshot {
                    tokens: signature_tokens(signature, version),
                    lines,
                })
                .collect();
            Some(ClassSnapshot { name, methods })
        })
        .collect()
}

fn build_dictionary(classes: &[ClassSnapshot]) -> Dictionary {
    let mut dict = Dictionary::new();
    for class in classes {
        let _ = dict.intern(&class.name);
    }
    for class in classes {
        for method in &class.methods {
            for token in &method.tokens {
                let _ = dict.intern(token);
            }
            for name in method.lines.iter().filter_map(LineData::test_name) {
                let _ = dict.intern(name);
            }
        }
    }
    dict
}

fn encode_line(enc: &mut Encoder, dict: &Dictionary, line: &LineData) -> ContarResult<()> {
    enc.write_u32(line.line_number());
    match line.test_name() {
        Some(name) => enc.write_u32(dict.id(name)? + 1),
        None => enc.write_u32(0),
    }
    enc.write_u32(line.hits());
    if line.hits() == 0 {
        return Ok(());
    }
    enc.write_len(line.jumps().len());
    for jump in line.jumps() {
        enc.write_u32(jump.true_hits());
        enc.write_u32(jump.false_hits());
    }
    enc.write_len(line.switches().len());
    for switch in line.switches() {
        enc.write_u32(switch.default_hits());
        enc.write_len(switch.keys().len());
        for (key, hits) in switch.keys().iter().zip(switch.hits()) {
            enc.write_i32(*key);
            enc.write_u32(*hits);
        }
    }
    Ok(())
}

/// Encode a project into bytes using protocol `version`
pub fn encode(project: &ProjectData, version: u32) -> ContarResult<Vec<u8>> {
    check_version(version)?;
    let classes = snapshot(project, version);
    let dict = build_dictionary(&classes);

    let mut enc = Encoder::new();
    enc.write_bytes(MAGIC);
    enc.write_u32(version);
    enc.write_len(dict.len());
    for s in dict.strings() {
        enc.write_str(s);
    }

    enc.write_len(classes.len());
    for class in &classes {
        enc.write_u32(dict.id(&class.name)?);
        enc.write_len(class.methods.len());
        for method in &class.methods {
            if version >= TOKENIZED_METHOD_ID_VERSION {
                enc.write_len(method.tokens.len());
            }
            for token in &method.tokens {
                enc.write_u32(dict.id(token)?);
            }
            enc.write_len(method.lines.len());
            for line in &method.lines {
                encode_line(&mut enc, &dict, line)?;
            }
        }
    }
    Ok(enc.finish())
}

/// Write a project to `writer` using protocol `version`
pub fn write_project<W: Write>(project: &ProjectData, mut writer: W, version: u32) -> ContarResult<()> {
    let bytes = encode(project, version)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    debug!(bytes = bytes.len(), version, "coverage data written");
    Ok(())
}

/// Write a project to the file at `path`, replacing it
pub fn save(project: &ProjectData, path: &Path, version: u32) -> ContarResult<()> {
    let file = File::create(path)?;
    write_project(project, BufWriter::new(file), version)
}
