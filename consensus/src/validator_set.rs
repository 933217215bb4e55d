use e2c_types::{max_faulty, Address, View};

/// A fixed validator set for the current view (spec §3: "The ordered
/// validator list V is fixed for a view"). Grounded on the teacher's
/// `ValidatorList`, simplified: E2C does not support runtime
/// reconfiguration (spec §1 Non-goals), so there is no epoch machinery,
/// only the ordered list itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorList {
    validators: Vec<Address>,
}

impl ValidatorList {
    pub fn new(validators: Vec<Address>) -> Self {
        assert!(!validators.is_empty(), "validator set must not be empty");
        ValidatorList {
            validators,
        }
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.validators.contains(address)
    }

    /// `leader(v) = V[v mod N]`.
    pub fn leader(&self, view: View) -> Address {
        self.validators[(view as usize) % self.validators.len()]
    }

    pub fn count(&self) -> usize {
        self.validators.len()
    }

    /// `F = floor((n - 1) / 2)`.
    pub fn max_faulty(&self) -> usize {
        max_faulty(self.validators.len())
    }

    /// The quorum size used throughout the spec for blame/vote/validate
    /// aggregation: `F + 1` (spec §9 Open Question: blame threshold fixed
    /// at F+1, matching the vote-certificate threshold).
    pub fn quorum(&self) -> usize {
        self.max_faulty() + 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.validators.iter()
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.validators
    }
}

impl ::std::ops::Deref for ValidatorList {
    type Target = [Address];

    fn deref(&self) -> &[Address] {
        &self.validators
    }
}

impl From<Vec<Address>> for ValidatorList {
    fn from(validators: Vec<Address>) -> Self {
        ValidatorList::new(validators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::H160;

    fn addr(n: u64) -> Address {
        H160::from_low_u64_be(n)
    }

    #[test]
    fn leader_rotation_and_quorum() {
        let set = ValidatorList::new(vec![addr(1), addr(2), addr(3), addr(4)]);
        assert_eq!(set.max_faulty(), 1);
        assert_eq!(set.quorum(), 2);
        assert_eq!(set.leader(0), addr(1));
        assert_eq!(set.leader(4), addr(1));
        assert_eq!(set.leader(5), addr(2));
    }
}
