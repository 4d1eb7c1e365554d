#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose whole remainder is taken verbatim as `value`.
pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "category",
        action: "set_category",
    },
    CommandSpec {
        command: "style",
        action: "set_style",
    },
    CommandSpec {
        command: "vibe",
        action: "set_vibe",
    },
    CommandSpec {
        command: "custom_category",
        action: "set_custom_category",
    },
    CommandSpec {
        command: "custom_style",
        action: "set_custom_style",
    },
    CommandSpec {
        command: "custom_vibe",
        action: "set_custom_vibe",
    },
    CommandSpec {
        command: "overlay",
        action: "set_text_overlay",
    },
    CommandSpec {
        command: "prompt",
        action: "edit_prompt",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "upload",
        action: "attach_reference",
    },
    CommandSpec {
        command: "download",
        action: "download",
    },
];

pub(crate) const INDEX_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "select",
    action: "select_history",
}];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "resync",
        action: "resync_prompt",
    },
    CommandSpec {
        command: "clear_upload",
        action: "clear_reference",
    },
    CommandSpec {
        command: "generate",
        action: "submit",
    },
    CommandSpec {
        command: "regenerate",
        action: "regenerate",
    },
    CommandSpec {
        command: "history",
        action: "list_history",
    },
    CommandSpec {
        command: "clear_history",
        action: "clear_history",
    },
    CommandSpec {
        command: "theme",
        action: "toggle_theme",
    },
    CommandSpec {
        command: "show",
        action: "show",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
];

pub const STUDIO_HELP_COMMANDS: &[&str] = &[
    "/category",
    "/style",
    "/vibe",
    "/custom_category",
    "/custom_style",
    "/custom_vibe",
    "/overlay",
    "/prompt",
    "/resync",
    "/upload",
    "/clear_upload",
    "/generate",
    "/regenerate",
    "/history",
    "/select",
    "/clear_history",
    "/download",
    "/theme",
    "/show",
    "/help",
    "/quit",
];
