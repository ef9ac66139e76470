use std::fmt;

/// What the poller lists live videos for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTarget {
    /// A Facebook group.
    Group(String),
    /// The token owner's own timeline.
    User(String),
}

impl PollTarget {
    /// Graph API node id.
    pub fn id(&self) -> &str {
        match self {
            PollTarget::Group(id) | PollTarget::User(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PollTarget::Group(_) => "group",
            PollTarget::User(_) => "user",
        }
    }
}

impl fmt::Display for PollTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}
