pub const CONTAINER: &str = "bg-gray-900 container mx-auto px-6 py-10 max-w-3xl rounded-xl shadow-lg mt-16";
pub const CARD: &str = "bg-gray-800 border border-gray-700 rounded-lg shadow-md p-6 max-w-xl mx-auto mt-16";
pub const CONTEST_CARD: &str = "space-y-4 p-6 mb-4 border border-gray-700 rounded-lg bg-gray-800 shadow-lg";
pub const ALERT_CARD: &str = "p-4 rounded-lg shadow-md mb-6";

pub const INPUT_TOKEN: &str = "appearance-none border border-gray-600 bg-gray-800 text-white text-2xl tracking-widest font-mono text-center uppercase rounded-md w-full py-3 px-4 focus:outline-none focus:border-blue-500";

pub const BUTTON_BASE: &str = "px-5 py-2 rounded-lg font-medium text-white transition-all duration-150 disabled:opacity-50 disabled:cursor-not-allowed";
pub const BUTTON_PRIMARY: &str = "bg-blue-600 hover:bg-blue-700 focus:ring-2 focus:ring-blue-400 focus:outline-none";
pub const BUTTON_SUCCESS: &str = "bg-green-600 hover:bg-green-700 focus:ring-2 focus:ring-green-400 focus:outline-none";
pub const BUTTON_MUTED: &str = "bg-gray-600 hover:bg-gray-700 focus:ring-2 focus:ring-gray-400 focus:outline-none";
pub const BUTTON_DANGER: &str = "bg-red-600 hover:bg-red-700 focus:ring-2 focus:ring-red-400 focus:outline-none";

pub const CHOICE: &str = "w-full text-left px-4 py-3 rounded-lg border transition-all duration-150 ease-out";
pub const CHOICE_IDLE: &str = "bg-gray-700 border-gray-600 text-gray-300 hover:bg-gray-600";
pub const CHOICE_SELECTED: &str = "bg-blue-500 border-blue-400 text-white shadow-lg ring-2 ring-blue-400 ring-offset-1 ring-offset-gray-800";
pub const CHOICE_DECLINED: &str = "bg-gray-600 border-gray-400 text-gray-200 ring-2 ring-white";

pub const TEXT_LABEL: &str = "block text-sm font-semibold text-gray-200";
pub const TEXT_MUTED: &str = "text-sm text-gray-400";
pub const HEADING_LG: &str = "text-3xl font-extrabold mb-4 text-center text-gray-100";
pub const HEADING_MD: &str = "text-2xl font-bold mb-5 text-gray-100";
pub const HEADING_SM: &str = "text-xl font-semibold mb-3 text-gray-100";

pub const FLEX_BETWEEN: &str = "flex justify-between items-center";
pub const SPACE_Y_LG: &str = "space-y-6";

pub const COUNTDOWN: &str = "font-mono text-lg px-3 py-1 rounded-md";
pub const COUNTDOWN_OK: &str = "bg-gray-800 text-gray-200";
pub const COUNTDOWN_EXPIRING: &str = "bg-yellow-900 text-yellow-200 animate-pulse";

pub fn combine_classes(base: &str, additional: &str) -> String {
    format!("{} {}", base, additional)
}

pub fn button(variant: &str) -> String {
    combine_classes(BUTTON_BASE, variant)
}

pub fn choice(selected: bool, declined: bool) -> String {
    let state = match (selected, declined) {
        (true, true) => CHOICE_DECLINED,
        (true, false) => CHOICE_SELECTED,
        _ => CHOICE_IDLE,
    };
    combine_classes(CHOICE, state)
}

pub fn alert_style(style: &str) -> String {
    match style {
        "error" => combine_classes(ALERT_CARD, "bg-red-500 text-white shadow-lg"),
        "success" => combine_classes(ALERT_CARD, "bg-green-500 text-white shadow-lg"),
        "warning" => combine_classes(ALERT_CARD, "bg-yellow-500 text-white shadow-lg"),
        _ => combine_classes(ALERT_CARD, "bg-blue-500 text-white shadow-lg"),
    }
}
