//! Server capabilities and response status.

/// Status of a tagged or untagged condition response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed.
    No,
    /// Command was malformed or not allowed.
    Bad,
    /// Greeting of a pre-authenticated connection.
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

impl Status {
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }
}

/// A server capability relevant to this client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1`
    Imap4Rev1,
    /// `STARTTLS`
    StartTls,
    /// `LOGINDISABLED`
    LoginDisabled,
    /// `AUTH=<mechanism>`
    Auth(String),
    /// `UIDPLUS` (RFC 4315)
    UidPlus,
    /// `MOVE` (RFC 6851)
    Move,
    /// `WITHIN` (RFC 5032), enables `YOUNGER`/`OLDER` search keys.
    Within,
    /// `THREAD=<algorithm>` (RFC 5256)
    Thread(String),
    /// `SPECIAL-USE` (RFC 6154)
    SpecialUse,
    /// `LITERAL+`
    LiteralPlus,
    /// Anything else, uppercased.
    Other(String),
}

impl Capability {
    /// Parses a capability atom.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        if let Some(mech) = upper.strip_prefix("AUTH=") {
            return Self::Auth(mech.to_string());
        }
        if let Some(alg) = upper.strip_prefix("THREAD=") {
            return Self::Thread(alg.to_string());
        }
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            "UIDPLUS" => Self::UidPlus,
            "MOVE" => Self::Move,
            "WITHIN" => Self::Within,
            "SPECIAL-USE" => Self::SpecialUse,
            "LITERAL+" => Self::LiteralPlus,
            _ => Self::Other(upper),
        }
    }
}
