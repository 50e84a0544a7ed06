//! PICA register command stream codec.
//!
//! Several leaf records (lookup-table samplers, material texture units)
//! store their payload as a packed GPU register command stream. The engine
//! treats that payload as an opaque word list; this module is the
//! collaborator that turns it into ordered (register, parameters) pairs
//! and back. Register semantics are never interpreted here.
//!
//! # Wire layout
//!
//! Each command is two words followed by its extra parameters:
//!
//! ```text
//! word 0: first parameter
//! word 1: bits 0-15  register id
//!         bits 16-19 write mask
//!         bits 20-27 extra parameter count
//!         bit  31    consecutive-write flag
//! word 2+: extra parameters, padded to an even word count
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Selects which lighting LUT the following data words target.
pub const REG_LIGHTING_LUT_INDEX: u16 = 0x01C5;
/// First of the eight lighting LUT data registers.
pub const REG_LIGHTING_LUT_DATA0: u16 = 0x01C8;
/// Last of the eight lighting LUT data registers.
pub const REG_LIGHTING_LUT_DATA7: u16 = 0x01CF;
/// End-of-list marker register.
pub const REG_BLOCK_END: u16 = 0x023D;

/// Maximum parameters one command can carry (first + 255 extra).
pub const MAX_PARAMETERS: usize = 0x100;

/// One decoded register write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub register: u16,
    pub mask: u8,
    pub consecutive: bool,
    pub parameters: Vec<u32>,
}

/// A command header pointing past the end of the word buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("truncated command stream at word {0}")]
pub struct StreamError(pub usize);

/// Decode a word buffer into ordered commands. Stops after the
/// end-of-list marker if one is present.
pub fn parse(words: &[u32]) -> Result<Vec<Command>, StreamError> {
    let mut commands = Vec::new();
    let mut i = 0;
    while i < words.len() {
        if i + 2 > words.len() {
            return Err(StreamError(i));
        }
        let first = words[i];
        let header = words[i + 1];
        i += 2;

        let register = (header & 0xFFFF) as u16;
        let mask = ((header >> 16) & 0xF) as u8;
        let extra = ((header >> 20) & 0xFF) as usize;
        let consecutive = header >> 31 != 0;

        if i + extra > words.len() {
            return Err(StreamError(i));
        }
        let mut parameters = Vec::with_capacity(1 + extra);
        parameters.push(first);
        parameters.extend_from_slice(&words[i..i + extra]);
        i += extra;
        if extra % 2 == 1 {
            // Skip the alignment pad word.
            i += 1;
        }

        commands.push(Command {
            register,
            mask,
            consecutive,
            parameters,
        });
        if register == REG_BLOCK_END {
            break;
        }
    }
    Ok(commands)
}

/// Encodes commands into a word buffer.
#[derive(Debug, Default)]
pub struct CommandWriter {
    words: Vec<u32>,
}

impl CommandWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one register write. `parameters` must hold 1..=256 words.
    pub fn set_command(&mut self, register: u16, mask: u8, consecutive: bool, parameters: &[u32]) {
        assert!(
            !parameters.is_empty() && parameters.len() <= MAX_PARAMETERS,
            "command parameter count out of range"
        );
        let extra = parameters.len() - 1;
        self.words.push(parameters[0]);
        let header = u32::from(register)
            | (u32::from(mask & 0xF) << 16)
            | ((extra as u32) << 20)
            | (u32::from(consecutive) << 31);
        self.words.push(header);
        self.words.extend_from_slice(&parameters[1..]);
        if extra % 2 == 1 {
            self.words.push(0);
        }
    }

    /// Append the end-of-list marker.
    pub fn end(&mut self) {
        self.set_command(REG_BLOCK_END, 0xF, false, &[1]);
    }

    pub fn into_words(self) -> Vec<u32> {
        self.words
    }
}
