use std::fmt;

use crate::error::{MetaDataField, Result, SimError};

/// One-character meta-data code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    System,
    Application,
    Processing,
    Input,
    Output,
    Memory,
}

impl Code {
    pub fn from_char(c: char) -> Option<Code> {
        match c {
            'S' => Some(Code::System),
            'A' => Some(Code::Application),
            'P' => Some(Code::Processing),
            'I' => Some(Code::Input),
            'O' => Some(Code::Output),
            'M' => Some(Code::Memory),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Code::System => 'S',
            Code::Application => 'A',
            Code::Processing => 'P',
            Code::Input => 'I',
            Code::Output => 'O',
            Code::Memory => 'M',
        }
    }

    /// Label used in log text for operations carrying this code.
    pub fn kind(self) -> &'static str {
        match self {
            Code::System => "system",
            Code::Application => "application",
            Code::Processing => "processing action",
            Code::Input => "input",
            Code::Output => "output",
            Code::Memory => "memory",
        }
    }

    pub fn is_io(self) -> bool {
        matches!(self, Code::Input | Code::Output)
    }
}

/// Closed vocabulary of meta-data descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descriptor {
    Begin,
    Finish,
    HardDrive,
    Keyboard,
    Scanner,
    Monitor,
    Run,
    Allocate,
    Projector,
    Block,
}

impl Descriptor {
    const ALL: [Descriptor; 10] = [
        Descriptor::Begin,
        Descriptor::Finish,
        Descriptor::HardDrive,
        Descriptor::Keyboard,
        Descriptor::Scanner,
        Descriptor::Monitor,
        Descriptor::Run,
        Descriptor::Allocate,
        Descriptor::Projector,
        Descriptor::Block,
    ];

    pub fn parse(name: &str) -> Option<Descriptor> {
        Self::ALL.into_iter().find(|d| d.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Descriptor::Begin => "begin",
            Descriptor::Finish => "finish",
            Descriptor::HardDrive => "hard drive",
            Descriptor::Keyboard => "keyboard",
            Descriptor::Scanner => "scanner",
            Descriptor::Monitor => "monitor",
            Descriptor::Run => "run",
            Descriptor::Allocate => "allocate",
            Descriptor::Projector => "projector",
            Descriptor::Block => "block",
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed meta-data record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub code: Code,
    pub descriptor: Descriptor,
    pub cycles: u64,
}

impl Instruction {
    pub fn new(code: Code, descriptor: Descriptor, cycles: u64) -> Instruction {
        Instruction {
            code,
            descriptor,
            cycles,
        }
    }

    pub fn is(&self, code: Code, descriptor: Descriptor) -> bool {
        self.code == code && self.descriptor == descriptor
    }

    /// Parses a single `C{descriptor}cycles` record. `record` is the 1-based
    /// position used in error messages.
    pub fn parse(text: &str, record: usize) -> Result<Instruction> {
        let text = text.trim_start();

        let mut chars = text.chars();
        let code_char = match chars.next() {
            None | Some('{') => {
                return Err(SimError::record(record, MetaDataField::Code, "is missing"));
            }
            Some(c) => c,
        };
        let code = Code::from_char(code_char).ok_or_else(|| {
            SimError::record(record, MetaDataField::Code, format!("'{code_char}' is not one of S, A, P, I, O, M"))
        })?;

        let rest = chars.as_str().trim_start();
        let rest = rest.strip_prefix('{').ok_or_else(|| {
            SimError::record(record, MetaDataField::Descriptor, "must be enclosed in braces")
        })?;
        let (name, rest) = rest.split_once('}').ok_or_else(|| {
            SimError::record(record, MetaDataField::Descriptor, "is missing its closing brace")
        })?;
        if name.trim().is_empty() {
            return Err(SimError::record(record, MetaDataField::Descriptor, "is missing"));
        }
        let descriptor = Descriptor::parse(name).ok_or_else(|| {
            SimError::record(record, MetaDataField::Descriptor, format!("'{name}' is not a valid descriptor"))
        })?;

        let digits = rest.trim();
        if digits.is_empty() {
            return Err(SimError::record(record, MetaDataField::Cycles, "is missing"));
        }
        let cycles = digits.parse::<u64>().map_err(|err| {
            SimError::record(record, MetaDataField::Cycles, format!("'{digits}' is not a non-negative integer: {err}"))
        })?;

        Ok(Instruction::new(code, descriptor, cycles))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}{}", self.code.as_char(), self.descriptor, self.cycles)
    }
}
