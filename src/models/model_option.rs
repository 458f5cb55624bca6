/// A model offered by the selector.
///
/// Availability ultimately depends on the backend's account permissions;
/// this table only drives the UI and request validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOption {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub context_length: u32,
}

pub const AVAILABLE_MODELS: &[ModelOption] = &[
    ModelOption {
        id: "gpt-4o-mini",
        name: "GPT-4o mini",
        description: "Fast + cheap (good default)",
        context_length: 128_000,
    },
    ModelOption {
        id: "gpt-4o",
        name: "GPT-4o",
        description: "Stronger general model",
        context_length: 128_000,
    },
    ModelOption {
        id: "o3-mini",
        name: "o3-mini",
        description: "Small reasoning model",
        context_length: 200_000,
    },
    ModelOption {
        id: "gpt-5.1",
        name: "GPT-5.1",
        description: "Latest flagship",
        context_length: 400_000,
    },
    ModelOption {
        id: "gpt-5-mini",
        name: "GPT-5 mini",
        description: "Cheaper GPT-5 variant",
        context_length: 400_000,
    },
];

pub fn is_valid_model(model_id: &str) -> bool {
    AVAILABLE_MODELS.iter().any(|m| m.id == model_id)
}

pub fn model_by_id(model_id: &str) -> Option<&'static ModelOption> {
    AVAILABLE_MODELS.iter().find(|m| m.id == model_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_is_listed() {
        assert!(is_valid_model("gpt-4o-mini"));
        assert!(!is_valid_model("gpt-2"));
        assert_eq!(model_by_id("gpt-4o").unwrap().name, "GPT-4o");
    }
}
