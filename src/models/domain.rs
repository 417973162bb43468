use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// Board game record
///
/// Games returned by catalog search are "bare" (empty `categories` and
/// `designers`); games returned by profile hydration carry both sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub g_id: i64,
    pub name: String,
    #[serde(default)]
    pub avgscore: Option<f64>,
    #[serde(default)]
    pub numvotes: Option<i64>,
    #[serde(default)]
    pub minplayers: Option<i32>,
    #[serde(default)]
    pub maxplayers: Option<i32>,
    #[serde(default)]
    pub minplaytime: Option<i32>,
    #[serde(default)]
    pub maxplaytime: Option<i32>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub designers: Vec<Designer>,
}

impl Game {
    /// Create a bare game with only identity fields set
    pub fn new(g_id: i64, name: impl Into<String>) -> Self {
        Self {
            g_id,
            name: name.into(),
            avgscore: None,
            numvotes: None,
            minplayers: None,
            maxplayers: None,
            minplaytime: None,
            maxplaytime: None,
            categories: Vec::new(),
            designers: Vec::new(),
        }
    }

    /// Copy of this game with the association sets cleared
    pub fn bare(&self) -> Self {
        Self {
            categories: Vec::new(),
            designers: Vec::new(),
            ..self.clone()
        }
    }

    pub fn category_ids(&self) -> Vec<i64> {
        self.categories.iter().map(|c| c.c_id).collect()
    }

    pub fn designer_ids(&self) -> Vec<i64> {
        self.designers.iter().map(|d| d.des_id).collect()
    }
}

/// Game designer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Designer {
    pub des_id: i64,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
}

/// Game category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub c_id: i64,
    pub name: String,
}

/// Filters applied to candidate generation and caps applied to results
///
/// Every optional field means "no filter on that dimension" when absent.
/// Unknown fields are ignored so callers can pass a superset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Constraints {
    /// Exact player count the game must support
    #[serde(default)]
    pub players: Option<i32>,
    #[serde(default)]
    pub minplayers: Option<i32>,
    #[serde(default)]
    pub maxplayers: Option<i32>,
    #[serde(default)]
    pub minplaytime: Option<i32>,
    #[serde(default)]
    pub maxplaytime: Option<i32>,
    /// Popularity floor; games with an unknown vote count still pass
    #[serde(default = "default_min_votes")]
    pub min_votes: i64,
    #[validate(range(min = 1))]
    #[serde(default = "default_limit_candidates")]
    pub limit_candidates: u32,
    #[validate(range(min = 1))]
    #[serde(default = "default_limit_final")]
    pub limit_final: u32,
}

fn default_min_votes() -> i64 { 500 }
fn default_limit_candidates() -> u32 { 200 }
fn default_limit_final() -> u32 { 8 }

impl Default for Constraints {
    fn default() -> Self {
        Self {
            players: None,
            minplayers: None,
            maxplayers: None,
            minplaytime: None,
            maxplaytime: None,
            min_votes: default_min_votes(),
            limit_candidates: default_limit_candidates(),
            limit_final: default_limit_final(),
        }
    }
}

/// Which attribute an overlap is counted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlapDimension {
    Category,
    Designer,
}

impl OverlapDimension {
    pub fn as_str(self) -> &'static str {
        match self {
            OverlapDimension::Category => "category",
            OverlapDimension::Designer => "designer",
        }
    }
}

/// Canonical candidate shape consumed by the scorer
///
/// Overlaps are counts when they come from the generators, but callers may
/// hand back any non-negative number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub g_id: i64,
    #[serde(default)]
    pub cat_overlap: f64,
    #[serde(default)]
    pub designer_overlap: f64,
}

impl Candidate {
    pub fn new(g_id: i64, cat_overlap: u32, designer_overlap: u32) -> Self {
        Self {
            g_id,
            cat_overlap: f64::from(cat_overlap),
            designer_overlap: f64::from(designer_overlap),
        }
    }

    /// Zero-overlap candidate for an entry that carried only an identifier
    pub fn bare(g_id: i64) -> Self {
        Self::new(g_id, 0, 0)
    }
}

/// Candidate entry as it arrives over the wire
///
/// Orchestrators sometimes pass plain identifiers instead of generator
/// records; both forms normalize into a [`Candidate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CandidateEntry {
    Bare(i64),
    Record(Candidate),
}

impl CandidateEntry {
    /// Read one entry of a `candidates` array
    ///
    /// An integral number is a bare identifier. An object needs an integral
    /// `g_id`; a missing or null overlap counts as zero, any other overlap
    /// must be a non-negative number. Returns `None` for everything else.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(_) => integral_id(value).map(CandidateEntry::Bare),
            Value::Object(fields) => {
                let g_id = fields.get("g_id").and_then(integral_id)?;
                Some(CandidateEntry::Record(Candidate {
                    g_id,
                    cat_overlap: overlap_field(fields.get("cat_overlap"))?,
                    designer_overlap: overlap_field(fields.get("designer_overlap"))?,
                }))
            }
            _ => None,
        }
    }
}

impl From<CandidateEntry> for Candidate {
    fn from(entry: CandidateEntry) -> Self {
        match entry {
            CandidateEntry::Bare(g_id) => Candidate::bare(g_id),
            CandidateEntry::Record(candidate) => candidate,
        }
    }
}

/// `10` and `10.0` are both game 10; `10.5` is not an identifier
fn integral_id(value: &Value) -> Option<i64> {
    if let Some(id) = value.as_i64() {
        return Some(id);
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
        .map(|f| f as i64)
}

fn overlap_field(value: Option<&Value>) -> Option<f64> {
    match value {
        None | Some(Value::Null) => Some(0.0),
        Some(v) => v.as_f64().filter(|f| f.is_finite() && *f >= 0.0),
    }
}

/// Generator output: a candidate plus the display fields used for ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub g_id: i64,
    pub name: String,
    #[serde(default)]
    pub numvotes: Option<i64>,
    #[serde(default)]
    pub cat_overlap: u32,
    #[serde(default)]
    pub designer_overlap: u32,
}

impl CandidateMatch {
    /// Overlap count on the given dimension
    pub fn overlap(&self, dimension: OverlapDimension) -> u32 {
        match dimension {
            OverlapDimension::Category => self.cat_overlap,
            OverlapDimension::Designer => self.designer_overlap,
        }
    }

    pub fn candidate(&self) -> Candidate {
        Candidate::new(self.g_id, self.cat_overlap, self.designer_overlap)
    }
}

/// Quality inputs for one game, as stored
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GameStats {
    pub avgscore: Option<f64>,
    pub numvotes: Option<i64>,
}

/// Scored candidate, only lives for the duration of one scoring call
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub g_id: i64,
    pub score: f64,
}
