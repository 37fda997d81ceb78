//! Pack catalog and canonical pack naming
//!
//! Every pack occupies a fixed slot identified by `<ordinal>_<Title>_v<major>`.
//! The catalog below is the single source for slot names, the top-level
//! sections each slot must carry, and the container type of each section.
//! The resolver and the integrity checker both read from it.

use crate::error::{PackError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// File extension of serialized packs
pub const PACK_EXTENSION: &str = "json";

/// Header key holding the pack schema version
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Header key holding the names of packs that must be built first
pub const DEPENDS_ON_KEY: &str = "depends_on";

lazy_static! {
    static ref PACK_FILE_RE: Regex =
        Regex::new(r"^(\d{2})_([A-Za-z][A-Za-z0-9_]*?)_v(\d+)\.json$").expect("valid pack regex");
    static ref PACK_NAME_RE: Regex =
        Regex::new(r"^(\d{2})_([A-Za-z][A-Za-z0-9_]*?)_v(\d+)$").expect("valid pack regex");
}

/// JSON value kind, used for contract expectations and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// JSON null
    Null,
    /// JSON boolean
    Boolean,
    /// JSON number
    Number,
    /// JSON string
    String,
    /// JSON array
    List,
    /// JSON object
    Object,
    /// The key is absent altogether
    Missing,
}

impl ValueKind {
    /// Kind of a present value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::List,
            Value::Object(_) => Self::Object,
        }
    }

    /// Kind of an optional value, `Missing` when absent
    pub fn of_opt(value: Option<&Value>) -> Self {
        value.map_or(Self::Missing, Self::of)
    }

    /// Lowercase name used in diagnostics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::List => "list",
            Self::Object => "object",
            Self::Missing => "missing",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One canonical slot in the pack bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackSlot {
    /// Two-digit position in the bundle
    pub ordinal: u8,
    /// Title segment, e.g. `Workflow_Graphs`
    pub title: &'static str,
    /// Major schema version
    pub major: u32,
    /// Primary sections and their expected container type
    pub sections: &'static [(&'static str, ValueKind)],
}

impl PackSlot {
    /// Slot identifier, e.g. `08_Workflow_Graphs_v1`
    pub fn name(&self) -> String {
        format!("{:02}_{}_v{}", self.ordinal, self.title, self.major)
    }

    /// Canonical file name, e.g. `08_Workflow_Graphs_v1.json`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name(), PACK_EXTENSION)
    }

    /// Two-digit ordinal label, e.g. `"08"`
    pub fn label(&self) -> String {
        format!("{:02}", self.ordinal)
    }

    /// Header keys followed by primary sections
    pub fn required_sections(&self) -> impl Iterator<Item = (&'static str, ValueKind)> + '_ {
        HEADER_SECTIONS.iter().chain(self.sections.iter()).copied()
    }
}

/// Keys every pack carries regardless of slot
pub const HEADER_SECTIONS: &[(&str, ValueKind)] = &[
    (SCHEMA_VERSION_KEY, ValueKind::String),
    (DEPENDS_ON_KEY, ValueKind::List),
];

/// The canonical bundle, in ordinal order
pub const CATALOG: &[PackSlot] = &[
    PackSlot {
        ordinal: 1,
        title: "Org_Profile",
        major: 1,
        sections: &[("agent", ValueKind::Object)],
    },
    PackSlot {
        ordinal: 2,
        title: "Global_Instructions",
        major: 2,
        sections: &[
            ("determinism", ValueKind::Object),
            ("gates", ValueKind::Object),
            ("instructions", ValueKind::List),
        ],
    },
    PackSlot {
        ordinal: 3,
        title: "RBAC_Policy",
        major: 1,
        sections: &[("roles", ValueKind::List)],
    },
    PackSlot {
        ordinal: 4,
        title: "Memory_Policy",
        major: 1,
        sections: &[("memory", ValueKind::Object)],
    },
    PackSlot {
        ordinal: 5,
        title: "Connectors",
        major: 1,
        sections: &[("connectors", ValueKind::List)],
    },
    PackSlot {
        ordinal: 6,
        title: "Data_Sources",
        major: 1,
        sections: &[("data_sources", ValueKind::List)],
    },
    PackSlot {
        ordinal: 7,
        title: "Prompt_Modules",
        major: 1,
        sections: &[("modules", ValueKind::List)],
    },
    PackSlot {
        ordinal: 8,
        title: "Workflow_Graphs",
        major: 1,
        sections: &[("graphs", ValueKind::List)],
    },
    PackSlot {
        ordinal: 9,
        title: "Governance",
        major: 1,
        sections: &[("governance", ValueKind::Object)],
    },
    PackSlot {
        ordinal: 10,
        title: "Human_Approval",
        major: 1,
        sections: &[("approval_gates", ValueKind::List)],
    },
    PackSlot {
        ordinal: 11,
        title: "Evaluation_Suite",
        major: 1,
        sections: &[("pass_gates", ValueKind::Object), ("suites", ValueKind::List)],
    },
    PackSlot {
        ordinal: 12,
        title: "Observability",
        major: 1,
        sections: &[
            ("decision_event_fields", ValueKind::Object),
            ("environment", ValueKind::String),
        ],
    },
    PackSlot {
        ordinal: 13,
        title: "Report_Templates",
        major: 1,
        sections: &[("templates", ValueKind::List)],
    },
    PackSlot {
        ordinal: 14,
        title: "KPI_Gates",
        major: 1,
        sections: &[("gates", ValueKind::Object), ("kpis", ValueKind::List)],
    },
];

/// Look up a catalog slot by ordinal
pub fn slot(ordinal: u8) -> Option<&'static PackSlot> {
    CATALOG.iter().find(|s| s.ordinal == ordinal)
}

/// Look up a catalog slot by its full name (`07_Prompt_Modules_v1`)
pub fn slot_by_name(name: &str) -> Option<&'static PackSlot> {
    CATALOG.iter().find(|s| s.name() == name)
}

/// Parsed `<ordinal>_<Title>_v<major>` identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackName {
    /// Two-digit ordinal
    pub ordinal: u8,
    /// Title segment
    pub title: String,
    /// Major version
    pub major: u32,
}

impl PackName {
    /// Parse a pack file name (`01_Org_Profile_v1.json`)
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        Self::from_captures(&PACK_FILE_RE, file_name)
    }

    fn from_captures(re: &Regex, input: &str) -> Option<Self> {
        let caps = re.captures(input)?;
        Some(Self {
            ordinal: caps[1].parse().ok()?,
            title: caps[2].to_string(),
            major: caps[3].parse().ok()?,
        })
    }

    /// Catalog slot this name occupies, if it is canonical
    pub fn slot(&self) -> Option<&'static PackSlot> {
        slot(self.ordinal).filter(|s| s.title == self.title && s.major == self.major)
    }

    /// File name with the pack extension
    pub fn file_name(&self) -> String {
        format!("{}.{}", self, PACK_EXTENSION)
    }
}

impl fmt::Display for PackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}_{}_v{}", self.ordinal, self.title, self.major)
    }
}

impl FromStr for PackName {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_captures(&PACK_NAME_RE, s)
            .ok_or_else(|| PackError::Structural(format!("invalid pack name: {s}")))
    }
}

/// A named pack payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackDocument {
    /// Pack name without extension
    pub name: String,
    /// Parsed JSON payload
    pub payload: Value,
}

impl PackDocument {
    /// Wrap a payload under `name`
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Declared `depends_on` entries; non-string entries are ignored
    pub fn depends_on(&self) -> Vec<String> {
        self.payload
            .get(DEPENDS_ON_KEY)
            .and_then(Value::as_array)
            .map(|deps| {
                deps.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
