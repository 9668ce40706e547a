use crate::parser::Variable;

/// Integer bindings for the 26 variables. Unassigned variables read as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    slots: [i64; 26],
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, variable: Variable) -> i64 {
        self.slots[variable.index()]
    }

    pub fn insert(&mut self, variable: Variable, value: i64) {
        self.slots[variable.index()] = value;
    }
}
