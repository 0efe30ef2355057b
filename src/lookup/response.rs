use serde::{Deserialize, Serialize};

use crate::models::{AddressObject, Field, ObjectId};

/// One address object as shown in the form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: ObjectId,
    pub label: String,
}

impl From<&AddressObject> for Entry {
    fn from(object: &AddressObject) -> Self {
        Self {
            id: object.id,
            label: object.display_name.clone(),
        }
    }
}

impl Entry {
    pub fn is_empty(&self) -> bool {
        self.id == 0
    }
}

/// Fields with exactly one answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filled {
    pub region: Entry,
    pub district: Entry,
    pub place: Entry,
    pub street: Entry,
    pub zip: String,
}

impl Filled {
    pub fn get(&self, field: Field) -> &Entry {
        match field {
            Field::Region => &self.region,
            Field::District => &self.district,
            Field::Place => &self.place,
            Field::Street => &self.street,
        }
    }

    pub fn get_mut(&mut self, field: Field) -> &mut Entry {
        match field {
            Field::Region => &mut self.region,
            Field::District => &mut self.district,
            Field::Place => &mut self.place,
            Field::Street => &mut self.street,
        }
    }
}

/// Open choices per field, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestions {
    pub region: Vec<Entry>,
    pub district: Vec<Entry>,
    pub place: Vec<Entry>,
    pub street: Vec<Entry>,
}

impl Suggestions {
    pub fn get(&self, field: Field) -> &[Entry] {
        match field {
            Field::Region => &self.region,
            Field::District => &self.district,
            Field::Place => &self.place,
            Field::Street => &self.street,
        }
    }

    pub fn get_mut(&mut self, field: Field) -> &mut Vec<Entry> {
        match field {
            Field::Region => &mut self.region,
            Field::District => &mut self.district,
            Field::Place => &mut self.place,
            Field::Street => &mut self.street,
        }
    }

    pub fn is_empty(&self) -> bool {
        Field::all().iter().all(|f| self.get(*f).is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressResponse {
    pub filled: Filled,
    pub suggestions: Suggestions,
}

impl AddressResponse {
    /// Response carrying only an echoed postal code
    pub fn empty(zip: &str) -> Self {
        Self {
            filled: Filled {
                zip: zip.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn fill(&mut self, object: &AddressObject) {
        if let Some(field) = Field::from_level(object.level) {
            *self.filled.get_mut(field) = Entry::from(object);
        }
    }

    pub fn suggest(&mut self, object: &AddressObject) {
        if let Some(field) = Field::from_level(object.level) {
            self.suggestions.get_mut(field).push(Entry::from(object));
        }
    }

    /// Move every single-entry suggestion list into `filled`
    pub fn promote_singletons(&mut self) {
        for field in Field::all() {
            let list = self.suggestions.get_mut(*field);
            if list.len() == 1 {
                if let Some(only) = list.pop() {
                    *self.filled.get_mut(*field) = only;
                }
            }
        }
    }
}
