//! Built-in habit templates and first-launch seeding.

pub struct Preset {
    pub id: &'static str,
    pub name: &'static str,
    pub target: u32,
    pub category: &'static str,
    pub motivation: &'static str,
    pub tips: &'static [&'static str],
}

pub static PRESETS: &[Preset] = &[
    Preset {
        id: "water",
        name: "Drink water",
        target: 8,
        category: "Health",
        motivation: "Stay hydrated and keep your energy up.",
        tips: &["Keep a bottle on your desk", "Drink a glass with every meal"],
    },
    Preset {
        id: "walk",
        name: "Walk",
        target: 1,
        category: "Fitness",
        motivation: "A short walk clears the head.",
        tips: &["Take the stairs", "Walk during phone calls"],
    },
    Preset {
        id: "read",
        name: "Read 10 pages",
        target: 1,
        category: "Learning",
        motivation: "Small daily reading adds up to many books a year.",
        tips: &["Keep a book by your bed"],
    },
    Preset {
        id: "meditate",
        name: "Meditate",
        target: 1,
        category: "Mindfulness",
        motivation: "Ten quiet minutes make a calmer day.",
        tips: &["Same time, same place", "Start with three minutes"],
    },
    Preset {
        id: "journal",
        name: "Journal",
        target: 1,
        category: "Mindfulness",
        motivation: "Writing things down makes them clearer.",
        tips: &["Write three lines before bed"],
    },
];

/// Habits seeded into an empty store on first launch.
pub const FIRST_LAUNCH_PRESETS: [&str; 2] = ["water", "walk"];

pub fn find_preset(id: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.id.eq_ignore_ascii_case(id.trim()))
}
