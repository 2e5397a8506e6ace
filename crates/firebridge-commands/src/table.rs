//! Static command table

use crate::spec::{CommandCategory, CommandSpec, ScanDirection};

/// Every fixed command identifier the bridge understands
pub static COMMANDS: &[CommandSpec] = &[
    // Navigation
    CommandSpec::device_action("DPAD_UP", CommandCategory::Navigation),
    CommandSpec::device_action("DPAD_DOWN", CommandCategory::Navigation),
    CommandSpec::device_action("DPAD_LEFT", CommandCategory::Navigation),
    CommandSpec::device_action("DPAD_RIGHT", CommandCategory::Navigation),
    CommandSpec::device_action("SELECT", CommandCategory::Navigation),
    CommandSpec::device_action("HOME", CommandCategory::Navigation),
    CommandSpec::device_action("BACK", CommandCategory::Navigation),
    CommandSpec::device_action("BACKSPACE", CommandCategory::Navigation),
    CommandSpec::device_action("MENU", CommandCategory::Navigation),
    CommandSpec::device_action("EPG", CommandCategory::Navigation),
    // Power
    CommandSpec::device_action("SLEEP", CommandCategory::Power),
    // Media
    CommandSpec::media_action("PLAY_PAUSE", "play"),
    CommandSpec::media_action("PAUSE", "pause"),
    CommandSpec::media_scan("FAST_FORWARD", ScanDirection::Forward),
    CommandSpec::media_scan("REWIND", ScanDirection::Back),
    CommandSpec::media_action("NEXT", "skip_forward"),
    CommandSpec::media_action("PREVIOUS", "skip_back"),
    // Apps
    CommandSpec::app_launch("LAUNCH_NETFLIX", "com.netflix.ninja"),
    CommandSpec::app_launch("LAUNCH_PRIME_VIDEO", "com.amazon.avod"),
    CommandSpec::app_launch("LAUNCH_DISNEY_PLUS", "com.disney.disneyplus"),
    CommandSpec::app_launch("LAUNCH_PLEX", "com.plexapp.android"),
    CommandSpec::app_launch("LAUNCH_KODI", "org.xbmc.kodi"),
];
