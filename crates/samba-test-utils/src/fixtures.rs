//! Mattermost fixtures for the in-memory host.
//!
//! | ID   | What                                             |
//! |------|--------------------------------------------------|
//! | `u1` | user `alice`, "Alice Liddell", avatar updated    |
//! | `C1` | open channel `town-square` in team `t1`          |
//! | `P1` | private channel `design` in team `t1`            |
//! | `D1` | direct message channel                           |
//! | `t1` | team `acme`                                      |

use samba_plugin::models::{Channel, ChannelType, Team, User};
use samba_plugin::services::host::mock::MockHost;

pub const TEST_USER_ID: &str = "u1";
pub const TEST_CHANNEL_ID: &str = "C1";
pub const TEST_PRIVATE_CHANNEL_ID: &str = "P1";
pub const TEST_DIRECT_CHANNEL_ID: &str = "D1";
pub const TEST_TEAM_ID: &str = "t1";
pub const TEST_SITE_URL: &str = "https://chat.example.com";

pub fn test_user() -> User {
    User {
        id: TEST_USER_ID.to_string(),
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        first_name: "Alice".to_string(),
        last_name: "Liddell".to_string(),
        nickname: String::new(),
        last_picture_update: 1_700_000_000_000,
    }
}

fn channel(id: &str, team_id: &str, channel_type: ChannelType, name: &str, display: &str) -> Channel {
    Channel {
        id: id.to_string(),
        team_id: team_id.to_string(),
        channel_type,
        name: name.to_string(),
        display_name: display.to_string(),
    }
}

/// A host seeded with every fixture above.
pub fn test_host() -> MockHost {
    MockHost::new()
        .with_user(test_user())
        .with_channel(channel(
            TEST_CHANNEL_ID,
            TEST_TEAM_ID,
            ChannelType::Open,
            "town-square",
            "Town Square",
        ))
        .with_channel(channel(
            TEST_PRIVATE_CHANNEL_ID,
            TEST_TEAM_ID,
            ChannelType::Private,
            "design",
            "Design",
        ))
        .with_channel(channel(
            TEST_DIRECT_CHANNEL_ID,
            "",
            ChannelType::Direct,
            "u1__u2",
            "",
        ))
        .with_team(Team {
            id: TEST_TEAM_ID.to_string(),
            name: "acme".to_string(),
            display_name: "Acme".to_string(),
        })
        .with_site_url(TEST_SITE_URL)
}
