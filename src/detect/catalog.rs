use serde::Serialize;

use super::result::Severity;

/// A condition the scanner can report, with the canned confidence the
/// demo detector uses for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectionProfile {
    pub label: &'static str,
    pub confidence_percent: u8,
    pub severity: Severity,
    pub accent_color: &'static str,
}

/// Conditions the scanner reports.
pub const DETECTABLE: &[DetectionProfile] = &[
    DetectionProfile {
        label: "Leaf Rust",
        confidence_percent: 88,
        severity: Severity::High,
        accent_color: "#ef4444",
    },
    DetectionProfile {
        label: "Powdery Mildew",
        confidence_percent: 92,
        severity: Severity::Medium,
        accent_color: "#f59e0b",
    },
    DetectionProfile {
        label: "Healthy Leaf",
        confidence_percent: 95,
        severity: Severity::None,
        accent_color: "#10b981",
    },
    DetectionProfile {
        label: "Leaf Spot",
        confidence_percent: 85,
        severity: Severity::High,
        accent_color: "#ef4444",
    },
    DetectionProfile {
        label: "Bacterial Blight",
        confidence_percent: 78,
        severity: Severity::Critical,
        accent_color: "#dc2626",
    },
];

/// Care advice for labels the scanner has no entry for.
pub const FALLBACK_RECOMMENDATIONS: &[&str] = &["Consult plant expert", "Monitor closely"];

/// Ordered care advice for a reported label.
pub fn recommendations_for(label: &str) -> &'static [&'static str] {
    match label {
        "Leaf Rust" => &[
            "Remove infected leaves",
            "Apply fungicide spray",
            "Improve air circulation",
        ],
        "Powdery Mildew" => &["Reduce humidity", "Apply neem oil", "Prune affected areas"],
        "Healthy Leaf" => &[
            "Maintain current care routine",
            "Monitor regularly",
            "Ensure proper watering",
        ],
        "Leaf Spot" => &[
            "Remove affected leaves",
            "Avoid overhead watering",
            "Apply copper fungicide",
        ],
        "Bacterial Blight" => &[
            "Isolate plant immediately",
            "Remove infected parts",
            "Apply bactericide",
        ],
        _ => FALLBACK_RECOMMENDATIONS,
    }
}

/// Display color for a severity badge.
pub fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "hsl(0, 70%, 58%)",
        Severity::Medium => "hsl(38, 92%, 60%)",
        Severity::Low => "hsl(140, 50%, 50%)",
        Severity::None => "hsl(150, 25%, 55%)",
    }
}

/// Encyclopedia entry for a known disease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiseaseProfile {
    pub name: &'static str,
    pub scientific_name: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    pub symptoms: &'static [&'static str],
    pub treatment: &'static [&'static str],
    pub prevention: &'static [&'static str],
}

pub const ENCYCLOPEDIA: &[DiseaseProfile] = &[
    DiseaseProfile {
        name: "Leaf Rust",
        scientific_name: "Puccinia spp.",
        severity: Severity::High,
        description: "Fungal disease causing rusty orange spots on leaves",
        symptoms: &["Orange pustules", "Leaf yellowing", "Premature leaf drop"],
        treatment: &[
            "Apply fungicide",
            "Remove infected leaves",
            "Improve air circulation",
        ],
        prevention: &[
            "Avoid overhead watering",
            "Space plants properly",
            "Use resistant varieties",
        ],
    },
    DiseaseProfile {
        name: "Powdery Mildew",
        scientific_name: "Erysiphe cichoracearum",
        severity: Severity::Medium,
        description: "White powdery coating on leaves and stems",
        symptoms: &["White powder on leaves", "Leaf distortion", "Stunted growth"],
        treatment: &["Apply sulfur spray", "Use neem oil", "Prune affected areas"],
        prevention: &["Ensure good air flow", "Avoid overcrowding", "Water at base"],
    },
    DiseaseProfile {
        name: "Leaf Spot",
        scientific_name: "Cercospora spp.",
        severity: Severity::High,
        description: "Dark spots with yellow halos on foliage",
        symptoms: &["Brown spots", "Yellow halos", "Leaf deterioration"],
        treatment: &[
            "Remove affected leaves",
            "Apply copper fungicide",
            "Improve drainage",
        ],
        prevention: &["Avoid wet foliage", "Sanitize tools", "Rotate crops"],
    },
    DiseaseProfile {
        name: "Bacterial Blight",
        scientific_name: "Pseudomonas syringae",
        severity: Severity::Critical,
        description: "Bacterial infection causing rapid tissue death",
        symptoms: &["Water-soaked lesions", "Rapid wilting", "Blackened stems"],
        treatment: &["Isolate plant", "Apply bactericide", "Remove infected tissue"],
        prevention: &[
            "Use clean tools",
            "Avoid injury to plants",
            "Control insects",
        ],
    },
    DiseaseProfile {
        name: "Downy Mildew",
        scientific_name: "Peronospora spp.",
        severity: Severity::High,
        description: "Fuzzy gray growth on leaf undersides",
        symptoms: &["Gray fuzz", "Yellow patches", "Leaf curling"],
        treatment: &["Apply fungicide", "Improve ventilation", "Remove debris"],
        prevention: &["Reduce humidity", "Water in morning", "Space plants"],
    },
];

/// Case-insensitive substring search over disease and scientific names.
pub fn search(query: &str) -> Vec<&'static DiseaseProfile> {
    let query = query.to_lowercase();
    ENCYCLOPEDIA
        .iter()
        .filter(|disease| {
            disease.name.to_lowercase().contains(&query)
                || disease.scientific_name.to_lowercase().contains(&query)
        })
        .collect()
}
