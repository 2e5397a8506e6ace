//! Resolved command descriptions

use firebridge_core::{DeviceRequest, HttpMethod};
use serde_json::json;
use std::borrow::Cow;
use std::fmt;

/// Path of navigation and power actions
pub const DEVICE_ACTION_PATH: &str = "/v1/{device}";
/// Path of media transport actions
pub const MEDIA_ACTION_PATH: &str = "/v1/media";
/// Path of app launches
pub const APP_LAUNCH_PATH: &str = "/v1/{device}/app/{pkg}";

/// Grouping of commands, used for listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCategory {
    Navigation,
    Power,
    Media,
    App,
}

impl fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandCategory::Navigation => "navigation",
            CommandCategory::Power => "power",
            CommandCategory::Media => "media",
            CommandCategory::App => "app",
        };
        f.write_str(name)
    }
}

/// Direction of a media scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanDirection {
    Forward,
    Back,
}

impl ScanDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanDirection::Forward => "forward",
            ScanDirection::Back => "back",
        }
    }
}

/// What goes into the request besides the path template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandParam {
    /// `?action=<name>`
    Action(&'static str),
    /// `?action=scan` with a direction body
    Scan(ScanDirection),
    /// Substituted for `{pkg}`
    AppPackage(Cow<'static, str>),
}

/// A command identifier resolved to a concrete device call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandSpec {
    pub identifier: Cow<'static, str>,
    pub category: CommandCategory,
    pub method: HttpMethod,
    pub path_template: &'static str,
    pub param: CommandParam,
}

impl CommandSpec {
    /// Navigation or power action; the action name is the identifier itself
    pub const fn device_action(identifier: &'static str, category: CommandCategory) -> Self {
        Self {
            identifier: Cow::Borrowed(identifier),
            category,
            method: HttpMethod::Post,
            path_template: DEVICE_ACTION_PATH,
            param: CommandParam::Action(identifier),
        }
    }

    /// Media transport action
    pub const fn media_action(identifier: &'static str, action: &'static str) -> Self {
        Self {
            identifier: Cow::Borrowed(identifier),
            category: CommandCategory::Media,
            method: HttpMethod::Post,
            path_template: MEDIA_ACTION_PATH,
            param: CommandParam::Action(action),
        }
    }

    /// Media scan (fast forward / rewind)
    pub const fn media_scan(identifier: &'static str, direction: ScanDirection) -> Self {
        Self {
            identifier: Cow::Borrowed(identifier),
            category: CommandCategory::Media,
            method: HttpMethod::Post,
            path_template: MEDIA_ACTION_PATH,
            param: CommandParam::Scan(direction),
        }
    }

    /// Pre-configured app launch
    pub const fn app_launch(identifier: &'static str, package: &'static str) -> Self {
        Self {
            identifier: Cow::Borrowed(identifier),
            category: CommandCategory::App,
            method: HttpMethod::Post,
            path_template: APP_LAUNCH_PATH,
            param: CommandParam::AppPackage(Cow::Borrowed(package)),
        }
    }

    /// App launch for an already validated package name
    pub(crate) fn custom_app(identifier: String, package: String) -> Self {
        Self {
            identifier: Cow::Owned(identifier),
            category: CommandCategory::App,
            method: HttpMethod::Post,
            path_template: APP_LAUNCH_PATH,
            param: CommandParam::AppPackage(Cow::Owned(package)),
        }
    }

    /// Package launched by this command, if it is an app launch
    pub fn app_package(&self) -> Option<&str> {
        match &self.param {
            CommandParam::AppPackage(package) => Some(package.as_ref()),
            _ => None,
        }
    }

    /// Render the request for a device whose API lives under `/v1/<device>`
    pub fn to_request(&self, device: &str) -> DeviceRequest {
        let path = self
            .path_template
            .replace("{device}", device)
            .replace("{pkg}", self.app_package().unwrap_or_default());

        let request = DeviceRequest {
            method: self.method,
            path,
            query: Vec::new(),
            body: None,
        };

        match &self.param {
            CommandParam::Action(action) => request.with_query("action", *action),
            CommandParam::Scan(direction) => request.with_query("action", "scan").with_body(json!({
                "direction": direction.as_str(),
                "keyAction": { "keyActionType": "keyDown" },
            })),
            CommandParam::AppPackage(_) => request,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.identifier, self.category)
    }
}
