use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Equipment categories in lookup order. The order is part of the
/// resolution contract: earlier categories win ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Counters,
    Stoves,
    Pots,
    Pans,
    DeepFryers,
    Plates,
    CuttingBoards,
    Sinks,
    TrashCans,
    ServingWindows,
    Conveyers,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Counters,
        Category::Stoves,
        Category::Pots,
        Category::Pans,
        Category::DeepFryers,
        Category::Plates,
        Category::CuttingBoards,
        Category::Sinks,
        Category::TrashCans,
        Category::ServingWindows,
        Category::Conveyers,
    ];

    /// Field name of this category in the state document.
    pub fn field(&self) -> &'static str {
        match self {
            Category::Counters => "counters",
            Category::Stoves => "stoves",
            Category::Pots => "pots",
            Category::Pans => "pans",
            Category::DeepFryers => "deepfryers",
            Category::Plates => "plates",
            Category::CuttingBoards => "cutting_boards",
            Category::Sinks => "sinks",
            Category::TrashCans => "trashcans",
            Category::ServingWindows => "serving_windows",
            Category::Conveyers => "conveyers",
        }
    }
}

/// Whatever sits on a counter, as reported by the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Occupancy {
    Item(OccupantDescriptor),
    Stack(Vec<Value>),
    Other(Value),
}

impl Occupancy {
    pub fn is_empty(&self) -> bool {
        match self {
            Occupancy::Item(item) => item.is_empty(),
            Occupancy::Stack(items) => items.is_empty(),
            Occupancy::Other(v) => match v {
                Value::Null | Value::Bool(false) => true,
                Value::String(s) => s.is_empty(),
                Value::Number(n) => n.as_f64() == Some(0.0),
                _ => false,
            },
        }
    }

    /// Object-shaped occupant, if any. Stacks never take part in occupant matching.
    pub fn item(&self) -> Option<&OccupantDescriptor> {
        match self {
            Occupancy::Item(item) if !item.is_empty() => Some(item),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OccupantDescriptor {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OccupantDescriptor {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.name.is_none() && self.extra.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupied_by: Option<Occupancy>,
}

impl EquipmentRecord {
    pub fn new(id: &str, kind: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            occupied_by: None,
        }
    }

    pub fn occupied_by(mut self, occupancy: Occupancy) -> Self {
        self.occupied_by = Some(occupancy);
        self
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied_by.as_ref().is_some_and(|o| !o.is_empty())
    }

    pub fn occupant(&self) -> Option<&OccupantDescriptor> {
        self.occupied_by.as_ref().and_then(Occupancy::item)
    }
}

/// Read-only view of the kitchen for one scheduling call.
/// Fields the agent does not use (players, orders, score...) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    #[serde(default)]
    pub counters: Vec<EquipmentRecord>,
    #[serde(default)]
    pub stoves: Vec<EquipmentRecord>,
    #[serde(default)]
    pub pots: Vec<EquipmentRecord>,
    #[serde(default)]
    pub pans: Vec<EquipmentRecord>,
    #[serde(default)]
    pub deepfryers: Vec<EquipmentRecord>,
    #[serde(default)]
    pub plates: Vec<EquipmentRecord>,
    #[serde(default)]
    pub cutting_boards: Vec<EquipmentRecord>,
    #[serde(default)]
    pub sinks: Vec<EquipmentRecord>,
    #[serde(default)]
    pub trashcans: Vec<EquipmentRecord>,
    #[serde(default)]
    pub serving_windows: Vec<EquipmentRecord>,
    #[serde(default)]
    pub conveyers: Vec<EquipmentRecord>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self, category: Category) -> &[EquipmentRecord] {
        match category {
            Category::Counters => &self.counters,
            Category::Stoves => &self.stoves,
            Category::Pots => &self.pots,
            Category::Pans => &self.pans,
            Category::DeepFryers => &self.deepfryers,
            Category::Plates => &self.plates,
            Category::CuttingBoards => &self.cutting_boards,
            Category::Sinks => &self.sinks,
            Category::TrashCans => &self.trashcans,
            Category::ServingWindows => &self.serving_windows,
            Category::Conveyers => &self.conveyers,
        }
    }

    pub fn records_mut(&mut self, category: Category) -> &mut Vec<EquipmentRecord> {
        match category {
            Category::Counters => &mut self.counters,
            Category::Stoves => &mut self.stoves,
            Category::Pots => &mut self.pots,
            Category::Pans => &mut self.pans,
            Category::DeepFryers => &mut self.deepfryers,
            Category::Plates => &mut self.plates,
            Category::CuttingBoards => &mut self.cutting_boards,
            Category::Sinks => &mut self.sinks,
            Category::TrashCans => &mut self.trashcans,
            Category::ServingWindows => &mut self.serving_windows,
            Category::Conveyers => &mut self.conveyers,
        }
    }

    /// Builder used by drivers and tests to assemble snapshots by hand.
    pub fn with(mut self, category: Category, record: EquipmentRecord) -> Self {
        self.records_mut(category).push(record);
        self
    }

    /// All records in category order, then snapshot order.
    pub fn iter_records(&self) -> impl Iterator<Item = &EquipmentRecord> + '_ {
        Category::ALL
            .into_iter()
            .flat_map(move |category| self.records(category).iter())
    }
}
