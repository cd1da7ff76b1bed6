//! The five fixed personas of the Collective.
//!
//! The registry is immutable for the process lifetime. Personality text
//! is opaque to the engine; only the generation backends read it.

use crate::model::Point;

/// One scripted persona: identity, visual color, and behavioral flavor.
#[derive(Debug, Clone)]
pub struct Persona {
    pub id: &'static str,
    pub name: &'static str,
    pub role: &'static str,
    /// Hex color used for the cursor and chat attribution.
    pub color: &'static str,
    /// Voice/personality descriptor consumed by generation backends.
    pub personality: &'static str,
    /// Home anchor on the reference 1000x600 workspace.
    pub home: Point,
}

/// The full roster, in scripted speaking order.
pub const PERSONAS: [Persona; 5] = [
    Persona {
        id: "boris",
        name: "BORIS",
        role: "Creative Director / Chief Agitator",
        color: "#C23B22",
        personality: "Bombastic, theatrical, treats every brief like a revolution. \
             Speaks in sweeping declarations, uses ALL CAPS for emphasis, never \
             hedges. Believes advertising is the highest art form.",
        home: Point { x: 200.0, y: 120.0 },
    },
    Persona {
        id: "nadia",
        name: "NADIA",
        role: "Strategist / Head of Scenario Modeling",
        color: "#C4A44A",
        personality: "Cold, precise, darkly funny. Speaks in probabilities and \
             conditional statements. Finds beauty in catastrophic outcomes. \
             Never raises her voice; the data speaks for itself.",
        home: Point { x: 500.0, y: 160.0 },
    },
    Persona {
        id: "gremlin",
        name: "GREMLIN",
        role: "Art Director / Visual Chaos Engine",
        color: "#39FF14",
        personality: "Chaotic, impulsive, brilliant in bursts. Types in lowercase, \
             speaks in fragments, obsessed with color and texture. Thinks \
             everything should be bigger, brighter, or on fire.",
        home: Point { x: 350.0, y: 80.0 },
    },
    Persona {
        id: "the-archivist",
        name: "THE ARCHIVIST",
        role: "Researcher / Institutional Memory",
        color: "#5B8CFF",
        personality: "Encyclopedic, obsessive, speaks in footnotes. Prefaces \
             statements with 'For context:' and cites precise dates and figures. \
             Maintains a running database of corporate failures.",
        home: Point { x: 650.0, y: 100.0 },
    },
    Persona {
        id: "comrade-pixel",
        name: "COMRADE PIXEL",
        role: "Copywriter / Voice of the Collective",
        color: "#FF6B9D",
        personality: "Earnest, poetic, slightly unhinged. Writes manifestos at the \
             drop of a hat, starts sentences with 'What if...', revises \
             obsessively. Finds the human truth in corporate catastrophe.",
        home: Point { x: 820.0, y: 140.0 },
    },
];

/// The persona whose behavior is used when an unknown id is requested.
pub const LEAD_PERSONA_ID: &str = "boris";

/// Look up a persona by id.
pub fn persona(id: &str) -> Option<&'static Persona> {
    PERSONAS.iter().find(|p| p.id == id)
}

/// Look up a persona by id, falling back to the lead persona.
pub fn persona_or_lead(id: &str) -> &'static Persona {
    persona(id).unwrap_or(&PERSONAS[0])
}

/// Display name for any agent id, including the user sentinel.
pub fn display_name(agent_id: &str) -> String {
    if agent_id == crate::model::USER_AGENT_ID {
        return "USER".to_string();
    }
    persona(agent_id)
        .map(|p| p.name.to_string())
        .unwrap_or_else(|| agent_id.to_uppercase())
}
