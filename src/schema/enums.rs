//! Closed enumerations used by the domain records and forms.
//!
//! Every enumeration serializes to the exact lowercase token stored by the
//! backend, and parsing is exact: `"Todo"` is not `"todo"`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An enumeration with a fixed set of wire tokens.
pub trait ClosedEnum: Sized + Copy + 'static {
    /// Wire tokens in declaration order
    const VARIANTS: &'static [&'static str];

    fn as_str(&self) -> &'static str;

    /// Exact, case-sensitive parse
    fn parse(token: &str) -> Option<Self>;

    /// `'a' | 'b' | 'c'`, as shown in validation messages
    fn expected() -> String {
        Self::VARIANTS
            .iter()
            .map(|v| format!("'{}'", v))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $token:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $token)] $variant),+
        }

        impl ClosedEnum for $name {
            const VARIANTS: &'static [&'static str] = &[$($token),+];

            fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $token),+
                }
            }

            fn parse(token: &str) -> Option<Self> {
                match token {
                    $($token => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <Self as ClosedEnum>::parse(s).ok_or_else(|| {
                    format!(
                        "Invalid enum value. Expected {}, received '{}'",
                        <Self as ClosedEnum>::expected(),
                        s
                    )
                })
            }
        }
    };
}

closed_enum! {
    /// Application role attached to a profile
    AppRole {
        Admin => "admin",
        ProjectManager => "project_manager",
        Developer => "developer",
        Tester => "tester",
        Viewer => "viewer",
    }
}

closed_enum! {
    /// Board column of a task
    TaskStatus {
        Todo => "todo",
        Progress => "progress",
        Review => "review",
        Done => "done",
    }
}

closed_enum! {
    TaskPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

closed_enum! {
    ProjectStatus {
        Active => "active",
        Planning => "planning",
        OnHold => "onhold",
        Completed => "completed",
    }
}

closed_enum! {
    /// Project priority (no `urgent` level, unlike tasks)
    ProjectPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

closed_enum! {
    NotificationType {
        TaskCompleted => "task_completed",
        Comment => "comment",
        UserAdded => "user_added",
        Deadline => "deadline",
    }
}

closed_enum! {
    /// Team size bucket on the demo request form
    TeamSize {
        Small => "1-10",
        Medium => "11-50",
        Large => "51-200",
        Enterprise => "200+",
    }
}
