/// Basic-auth pair sent with every request to Alertmanager.
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Both halves must be non-empty, otherwise no credentials are used at all.
    pub fn from_parts(username: Option<&str>, password: Option<&str>) -> Option<Self> {
        match (username, password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Self {
                    username: username.to_owned(),
                    password: password.to_owned(),
                })
            }
            _ => None,
        }
    }
}

// Request debug logs print the options, the password must never show up there.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
