use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub uid: i64,
    pub username: String,
    pub displayname: String,
    pub userslug: String,
    pub picture: String,
    pub signature: String,
    pub groups: Vec<String>,
    pub created_at: String,
}

/// The identity a request acts as. Guests carry uid 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub uid: i64,
}

impl Caller {
    pub const GUEST: Caller = Caller { uid: 0 };

    pub fn new(uid: i64) -> Self {
        Self { uid }
    }

    pub fn is_guest(&self) -> bool {
        self.uid <= 0
    }
}
