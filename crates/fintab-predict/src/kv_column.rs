//! Key-value predictor for vertically-oriented tables.
//!
//! Identical engine to [`crate::kv`], but keys sit above their values, so
//! the default pairing direction is up/down.

use fintab_core::RawElement;

use crate::config::{KvDirection, RuleConfig};
use crate::feature::ModelData;
use crate::kv::predict_kv;
use crate::{AnswerGroup, Predictor};

/// Extracts facts from cells stacked key-over-value.
#[derive(Debug, Clone)]
pub struct KeyValueColumnPredictor {
    rule: RuleConfig,
    model: ModelData,
}

impl KeyValueColumnPredictor {
    /// A predictor over one rule and its trained model.
    #[must_use]
    pub fn new(rule: RuleConfig, model: ModelData) -> Self {
        Self { rule, model }
    }
}

impl Predictor for KeyValueColumnPredictor {
    fn predict_schema_answer(&self, elements: &[RawElement]) -> Vec<AnswerGroup> {
        predict_kv(
            &self.rule,
            &self.model,
            elements,
            &[KvDirection::UpAndDown],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::table_element;

    #[test]
    fn defaults_to_vertical_pairing() {
        let mut model = ModelData::default();
        model.column_mut("公司名称").add("股票简称");
        let predictor =
            KeyValueColumnPredictor::new(RuleConfig::named("公司名称"), model);
        let elements = vec![table_element(
            0,
            &[&["股票简称", "注册地址"], &["XYZ", "上海市"]],
        )];
        let groups = predictor.predict_schema_answer(&elements);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["公司名称"][0].text, "XYZ");
    }
}
