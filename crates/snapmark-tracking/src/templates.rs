use serde::{Deserialize, Serialize};

/// Index of the template used for the `counter`-th spawn.
#[inline]
pub fn select_template(counter: u64, count: usize) -> usize {
    debug_assert!(count > 0);
    (counter % count as u64) as usize
}

/// Non-empty list of object templates, used round-robin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct TemplateSet {
    names: Vec<String>,
}

impl TemplateSet {
    /// Returns `None` for an empty list.
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Option<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            None
        } else {
            Some(Self { names })
        }
    }

    pub fn single(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Template for the `counter`-th spawn.
    pub fn pick(&self, counter: u64) -> &str {
        &self.names[select_template(counter, self.names.len())]
    }
}

impl TryFrom<Vec<String>> for TemplateSet {
    type Error = &'static str;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(names).ok_or("template list must not be empty")
    }
}

impl From<TemplateSet> for Vec<String> {
    fn from(set: TemplateSet) -> Self {
        set.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_is_round_robin() {
        let picks: Vec<usize> = (0..7).map(|c| select_template(c, 3)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn pick_cycles_through_names() {
        let set = TemplateSet::new(["cube", "sphere"]).unwrap();
        assert_eq!(set.pick(0), "cube");
        assert_eq!(set.pick(1), "sphere");
        assert_eq!(set.pick(2), "cube");
    }

    #[test]
    fn empty_set_is_rejected() {
        assert!(TemplateSet::new(Vec::<String>::new()).is_none());
        assert!(serde_json::from_str::<TemplateSet>("[]").is_err());
    }

    #[test]
    fn serializes_as_list() {
        let set = TemplateSet::new(["a"]).unwrap();
        assert_eq!(serde_json::to_string(&set).unwrap(), "[\"a\"]");
    }
}
