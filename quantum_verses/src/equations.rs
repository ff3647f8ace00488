//! Physics shown alongside each verse in the equations sidebar

/// Equation entry with label and formula
pub struct Equation {
    pub name: &'static str,
    pub formula: &'static str,
    pub description: &'static str,
}

// ============================================
// Double Slit
// ============================================

pub const DOUBLE_SLIT_EQUATIONS: &[Equation] = &[
    Equation {
        name: "Superposed Paths",
        formula: "ψ = ψ₁ + ψ₂",
        description: "Unobserved electron takes both slits",
    },
    Equation {
        name: "Interference Intensity",
        formula: "I(y) ∝ cos²(πdy/λL) · sinc²(πay/λL)",
        description: "Fringes under a single-slit envelope",
    },
    Equation {
        name: "Which-Path Measurement",
        formula: "I = |ψ₁|² + |ψ₂|²",
        description: "Observation removes the cross term",
    },
    Equation {
        name: "Fringe Spacing",
        formula: "Δy = λL/d",
        description: "Distance between bright bands",
    },
];

pub const DOUBLE_SLIT_VARIABLES: &[(&str, &str)] = &[
    ("d", "Slit separation"),
    ("a", "Slit width"),
    ("λ", "de Broglie wavelength"),
    ("L", "Barrier to screen distance"),
    ("y", "Position on the screen"),
];

// ============================================
// Superposition
// ============================================

pub const SUPERPOSITION_EQUATIONS: &[Equation] = &[
    Equation {
        name: "Qubit State",
        formula: "|ψ⟩ = α|↑⟩ + β|↓⟩",
        description: "Both outcomes held at once",
    },
    Equation {
        name: "Born Rule",
        formula: "P(↑) = |α|²",
        description: "Probability of each outcome",
    },
    Equation {
        name: "Collapse",
        formula: "|ψ⟩ → |↑⟩ or |↓⟩",
        description: "Observation selects one branch",
    },
];

pub const SUPERPOSITION_VARIABLES: &[(&str, &str)] = &[
    ("α, β", "Complex amplitudes"),
    ("|α|²+|β|²", "= 1 (normalization)"),
    ("|↑⟩,|↓⟩", "Spin basis"),
];

// ============================================
// Wave Packet
// ============================================

pub const WAVE_PACKET_EQUATIONS: &[Equation] = &[
    Equation {
        name: "Gaussian Packet",
        formula: "ψ(x,t) = A(t) e^(-(x-x₀)²/2σ(t)²) e^(i(kx-ωt))",
        description: "Localized wave with carrier k",
    },
    Equation {
        name: "Spreading",
        formula: "σ(t) = σ₀ + r·t",
        description: "Width grows as time passes",
    },
    Equation {
        name: "Uncertainty",
        formula: "Δx · Δp ≥ ℏ/2",
        description: "Position and momentum trade off",
    },
    Equation {
        name: "Dispersion",
        formula: "ω = ℏk²/2m",
        description: "Free-particle phase velocity",
    },
];

pub const WAVE_PACKET_VARIABLES: &[(&str, &str)] = &[
    ("σ₀", "Initial width"),
    ("r", "Spread rate"),
    ("k", "Wave number"),
    ("A(t)", "Amplitude, ∝ 1/√σ"),
];

// ============================================
// Entanglement
// ============================================

pub const ENTANGLEMENT_EQUATIONS: &[Equation] = &[
    Equation {
        name: "Singlet State",
        formula: "|Ψ⁻⟩ = (|↑↓⟩ - |↓↑⟩)/√2",
        description: "Spins always opposite on a shared axis",
    },
    Equation {
        name: "Correlation",
        formula: "P(same) = sin²(θ/2)",
        description: "Agreement at relative angle θ",
    },
    Equation {
        name: "Expectation",
        formula: "⟨σ_a·σ_b⟩ = -cos θ",
        description: "Quantum correlation function",
    },
];

pub const ENTANGLEMENT_VARIABLES: &[(&str, &str)] = &[
    ("θ", "Angle between detectors"),
    ("σ", "Spin measurement"),
    ("Ψ⁻", "Singlet Bell state"),
];

// ============================================
// Decay
// ============================================

pub const DECAY_EQUATIONS: &[Equation] = &[
    Equation {
        name: "Survival",
        formula: "P(t) = (1 - p)^t",
        description: "Chance the atom is still intact",
    },
    Equation {
        name: "Half-Life",
        formula: "t½ = ln 2 / -ln(1 - p)",
        description: "Time for half of a sample to decay",
    },
    Equation {
        name: "Entangled Cat",
        formula: "(|intact⟩|alive⟩ + |decayed⟩|dead⟩)/√2",
        description: "Box closed: both histories",
    },
];

pub const DECAY_VARIABLES: &[(&str, &str)] = &[
    ("p", "Decay probability per second"),
    ("t", "Time since the box was sealed"),
    ("t½", "Half-life"),
];

// ============================================
// Pair Creation
// ============================================

pub const PAIR_CREATION_EQUATIONS: &[Equation] = &[
    Equation {
        name: "Energy-Time Uncertainty",
        formula: "ΔE · Δt ≥ ℏ/2",
        description: "Borrowed energy must be repaid quickly",
    },
    Equation {
        name: "Pair Energy",
        formula: "E = 2mc²",
        description: "Cost of a particle and its antiparticle",
    },
    Equation {
        name: "Annihilation",
        formula: "e⁻ + e⁺ → γ + γ",
        description: "The pair vanishes back into the field",
    },
];

pub const PAIR_CREATION_VARIABLES: &[(&str, &str)] = &[
    ("ΔE", "Energy fluctuation"),
    ("Δt", "Lifetime of the pair"),
    ("m", "Particle mass"),
    ("c", "Speed of light"),
];
