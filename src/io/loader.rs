use std::fs;
use std::path::Path;

use super::Instruction;

use crate::error::{Result, SimError};

const START_MARKER: &str = "Start Program Meta-Data Code:";
const END_MARKER: &str = "End Program Meta-Data Code.";

/// Reads a meta-data file and returns its records in stream order.
pub fn load_meta_data(path: &Path) -> Result<Vec<Instruction>> {
    let text = fs::read_to_string(path)
        .map_err(|err| SimError::io("could not read meta-data file", path, err))?;

    parse_meta_data(&text)
}

/// Parses the full meta-data stream. The first malformed record fails the
/// whole load.
pub fn parse_meta_data(text: &str) -> Result<Vec<Instruction>> {
    let text = text.trim_start_matches('\u{feff}');
    let (header, body) = text.split_once('\n').unwrap_or((text, ""));

    if header.trim() != START_MARKER {
        return Err(SimError::MetaDataFormat(format!(
            "expected '{START_MARKER}' as the first line, found '{}'",
            header.trim()
        )));
    }

    let (records, footer) = body.split_once('.').ok_or_else(|| {
        SimError::MetaDataFormat("record list is not terminated by '.'".to_string())
    })?;

    if footer.trim() != END_MARKER {
        return Err(SimError::MetaDataFormat(format!(
            "expected '{END_MARKER}' after the last record, found '{}'",
            footer.trim()
        )));
    }

    let pieces: Vec<&str> = records.split(';').collect();
    let last = pieces.len() - 1;

    let mut instructions = Vec::with_capacity(pieces.len());
    for (i, piece) in pieces.iter().enumerate() {
        if i == last && piece.trim().is_empty() {
            break;
        }
        instructions.push(Instruction::parse(piece, i + 1)?);
    }

    Ok(instructions)
}
