use std::hash::{Hash, Hasher};

/// Identity record managed by the user service.
///
/// All fields are opaque strings. `id` is the lookup key, and two users are
/// equal when their ids are equal regardless of the remaining fields.
#[derive(Debug, Clone, Default)]
pub struct User {
    /// Lookup key.
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
}

impl User {
    /// Creates a user from its five fields in wire order.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            username: username.into(),
        }
    }

    /// Field-by-field comparison, unlike `==` which only compares ids.
    #[must_use]
    pub fn same_fields(&self, other: &Self) -> bool {
        self.id == other.id
            && self.first_name == other.first_name
            && self.last_name == other.last_name
            && self.email == other.email
            && self.username == other.username
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
