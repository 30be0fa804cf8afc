//! API surface table.
//!
//! [`action_table!`](crate::action_table) lists every supported method once as
//! `name(Marker): Params => Output;`. It takes the name of a callback macro and
//! expands to an invocation of it with the whole list, so the same table
//! drives the marker types below and the convenience methods of the client.
//! Adding a method means adding a line here.

use serde::{Deserialize, Serialize};

use super::api::Action;
use super::event::Sender;
use super::message::Message;

pub use super::api::{Ack, NoParams};

#[macro_export]
macro_rules! action_table {
    ($callback:ident) => {
        $callback! {
            /// Account the session is logged in as.
            get_login_info(GetLoginInfo): $crate::protocol::actions::NoParams
                => $crate::protocol::actions::LoginInfo;
            send_private_msg(SendPrivateMsg): $crate::protocol::actions::SendPrivateMsgParams
                => $crate::protocol::actions::MessageId;
            send_group_msg(SendGroupMsg): $crate::protocol::actions::SendGroupMsgParams
                => $crate::protocol::actions::MessageId;
            /// Send to a user or a group, picked by `message_type` or by
            /// which id is present.
            send_msg(SendMsg): $crate::protocol::actions::SendMsgParams
                => $crate::protocol::actions::MessageId;
            get_msg(GetMsg): $crate::protocol::actions::MessageIdParams
                => $crate::protocol::actions::MessageInfo;
            /// Recall a message.
            delete_msg(DeleteMsg): $crate::protocol::actions::MessageIdParams
                => $crate::protocol::actions::Ack;
            mark_msg_as_read(MarkMsgAsRead): $crate::protocol::actions::MessageIdParams
                => $crate::protocol::actions::Ack;
            get_stranger_info(GetStrangerInfo): $crate::protocol::actions::UserIdParams
                => $crate::protocol::actions::StrangerInfo;
            get_friend_list(GetFriendList): $crate::protocol::actions::NoParams
                => Vec<$crate::protocol::actions::FriendInfo>;
            delete_friend(DeleteFriend): $crate::protocol::actions::UserIdParams
                => $crate::protocol::actions::Ack;
            get_group_info(GetGroupInfo): $crate::protocol::actions::GroupIdParams
                => $crate::protocol::actions::GroupInfo;
            get_group_list(GetGroupList): $crate::protocol::actions::NoCacheParams
                => Vec<$crate::protocol::actions::GroupInfo>;
            get_group_member_info(GetGroupMemberInfo): $crate::protocol::actions::GroupMemberParams
                => $crate::protocol::actions::GroupMemberInfo;
            get_group_member_list(GetGroupMemberList): $crate::protocol::actions::GroupIdParams
                => Vec<$crate::protocol::actions::GroupMemberInfo>;
            /// Mute a member for `duration` seconds; 0 lifts the mute.
            set_group_ban(SetGroupBan): $crate::protocol::actions::SetGroupBanParams
                => $crate::protocol::actions::Ack;
            set_group_whole_ban(SetGroupWholeBan): $crate::protocol::actions::SetGroupWholeBanParams
                => $crate::protocol::actions::Ack;
            set_group_kick(SetGroupKick): $crate::protocol::actions::SetGroupKickParams
                => $crate::protocol::actions::Ack;
            set_group_card(SetGroupCard): $crate::protocol::actions::SetGroupCardParams
                => $crate::protocol::actions::Ack;
            set_group_name(SetGroupName): $crate::protocol::actions::SetGroupNameParams
                => $crate::protocol::actions::Ack;
            set_group_leave(SetGroupLeave): $crate::protocol::actions::SetGroupLeaveParams
                => $crate::protocol::actions::Ack;
            set_friend_add_request(SetFriendAddRequest): $crate::protocol::actions::SetFriendAddRequestParams
                => $crate::protocol::actions::Ack;
            set_group_add_request(SetGroupAddRequest): $crate::protocol::actions::SetGroupAddRequestParams
                => $crate::protocol::actions::Ack;
            get_version_info(GetVersionInfo): $crate::protocol::actions::NoParams
                => $crate::protocol::actions::VersionInfo;
            get_status(GetStatus): $crate::protocol::actions::NoParams
                => $crate::protocol::actions::RuntimeStatus;
            get_csrf_token(GetCsrfToken): $crate::protocol::actions::NoParams
                => $crate::protocol::actions::CsrfToken;
            get_cookies(GetCookies): $crate::protocol::actions::DomainParams
                => $crate::protocol::actions::Cookies;
            clean_cache(CleanCache): $crate::protocol::actions::NoParams
                => $crate::protocol::actions::Ack;
            set_restart(SetRestart): $crate::protocol::actions::SetRestartParams
                => $crate::protocol::actions::Ack;
        }
    };
}

macro_rules! define_markers {
    ($($(#[$doc:meta])* $name:ident($marker:ident): $params:ty => $output:ty;)*) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $marker;

            impl Action for $marker {
                const NAME: &'static str = stringify!($name);
                type Params = $params;
                type Output = $output;
            }
        )*

        /// Every method name in the table, in table order.
        pub const ACTION_NAMES: &[&str] = &[$(stringify!($name)),*];
    };
}

crate::action_table!(define_markers);

// ---- parameter shapes ----

/// Optional cache bypass shared by the lookup methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoCacheParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_cache: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendPrivateMsgParams {
    pub user_id: u64,
    pub message: Message,
    /// Temporary session through this group, for non-friends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<u64>,
    /// Send a tag string as literal text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_escape: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendGroupMsgParams {
    pub group_id: u64,
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_escape: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMsgParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<u64>,
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_escape: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageIdParams {
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdParams {
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_cache: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupIdParams {
    pub group_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_cache: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMemberParams {
    pub group_id: u64,
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_cache: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetGroupBanParams {
    pub group_id: u64,
    pub user_id: u64,
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetGroupWholeBanParams {
    pub group_id: u64,
    pub enable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetGroupKickParams {
    pub group_id: u64,
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_add_request: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetGroupCardParams {
    pub group_id: u64,
    pub user_id: u64,
    /// Empty or absent clears the card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetGroupNameParams {
    pub group_id: u64,
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetGroupLeaveParams {
    pub group_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dismiss: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetFriendAddRequestParams {
    pub flag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approve: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetGroupAddRequestParams {
    pub flag: String,
    /// `add` or `invite`, as reported by the request event.
    pub sub_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approve: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetRestartParams {
    /// Milliseconds to wait before restarting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
}

// ---- result shapes ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginInfo {
    pub user_id: u64,
    pub nickname: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageId {
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageInfo {
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub message_type: String,
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_id: Option<i64>,
    #[serde(default)]
    pub sender: Sender,
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrangerInfo {
    pub user_id: u64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendInfo {
    pub user_id: u64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_id: u64,
    #[serde(default)]
    pub group_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_member_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMemberInfo {
    pub group_id: u64,
    pub user_id: u64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,
    /// `owner`, `admin` or `member`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub join_time: i64,
    #[serde(default)]
    pub last_sent_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub app_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
}

/// `get_status` result. Distinct from the event-borne status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    #[serde(default)]
    pub good: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrfToken {
    pub token: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookies {
    pub cookies: String,
}
