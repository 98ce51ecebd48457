//! The fixed set of science and technology domains every requirement
//! vector is scored against.

use serde::Serialize;

/// Number of domains in the category set.
pub const CATEGORY_COUNT: usize = 22;

/// A technology/knowledge domain used as one dimension of a requirement vector.
///
/// Declaration order is the canonical order: it drives the rubric numbering
/// in prompts and the key order of serialized vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    #[serde(rename = "天文地理")]
    AstronomyGeography,
    #[serde(rename = "历史文明")]
    HistoryCivilization,
    #[serde(rename = "工业技术")]
    IndustrialTechnology,
    #[serde(rename = "数学")]
    Mathematics,
    #[serde(rename = "物理")]
    Physics,
    #[serde(rename = "化学")]
    Chemistry,
    #[serde(rename = "环境科学")]
    EnvironmentalScience,
    #[serde(rename = "能源科技")]
    EnergyTechnology,
    #[serde(rename = "军事科技")]
    MilitaryTechnology,
    #[serde(rename = "建筑水利")]
    ConstructionHydraulics,
    #[serde(rename = "交通运输")]
    Transportation,
    #[serde(rename = "农林牧渔")]
    Agriculture,
    #[serde(rename = "航空航天航海")]
    AerospaceNavigation,
    #[serde(rename = "健康管理")]
    HealthManagement,
    #[serde(rename = "临床知识")]
    ClinicalKnowledge,
    #[serde(rename = "安全科学")]
    SafetyScience,
    #[serde(rename = "信息技术")]
    InformationTechnology,
    #[serde(rename = "生物学")]
    Biology,
    #[serde(rename = "材料科学")]
    MaterialsScience,
    #[serde(rename = "科学家")]
    Scientists,
    #[serde(rename = "科学科幻")]
    ScienceFiction,
    #[serde(rename = "其他")]
    Other,
}

impl Category {
    /// All categories in canonical order.
    pub const ALL: [Category; CATEGORY_COUNT] = [
        Self::AstronomyGeography,
        Self::HistoryCivilization,
        Self::IndustrialTechnology,
        Self::Mathematics,
        Self::Physics,
        Self::Chemistry,
        Self::EnvironmentalScience,
        Self::EnergyTechnology,
        Self::MilitaryTechnology,
        Self::ConstructionHydraulics,
        Self::Transportation,
        Self::Agriculture,
        Self::AerospaceNavigation,
        Self::HealthManagement,
        Self::ClinicalKnowledge,
        Self::SafetyScience,
        Self::InformationTechnology,
        Self::Biology,
        Self::MaterialsScience,
        Self::Scientists,
        Self::ScienceFiction,
        Self::Other,
    ];

    /// Position of this category in canonical order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Display name, also the JSON key used by the annotation service.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AstronomyGeography => "天文地理",
            Self::HistoryCivilization => "历史文明",
            Self::IndustrialTechnology => "工业技术",
            Self::Mathematics => "数学",
            Self::Physics => "物理",
            Self::Chemistry => "化学",
            Self::EnvironmentalScience => "环境科学",
            Self::EnergyTechnology => "能源科技",
            Self::MilitaryTechnology => "军事科技",
            Self::ConstructionHydraulics => "建筑水利",
            Self::Transportation => "交通运输",
            Self::Agriculture => "农林牧渔",
            Self::AerospaceNavigation => "航空航天航海",
            Self::HealthManagement => "健康管理",
            Self::ClinicalKnowledge => "临床知识",
            Self::SafetyScience => "安全科学",
            Self::InformationTechnology => "信息技术",
            Self::Biology => "生物学",
            Self::MaterialsScience => "材料科学",
            Self::Scientists => "科学家",
            Self::ScienceFiction => "科学科幻",
            Self::Other => "其他",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }

    /// Disciplines covered by this domain, as shown in the scoring rubric.
    pub fn scope(&self) -> &'static str {
        match self {
            Self::AstronomyGeography => "天文学、地球科学、地理学、地质学、水文学、海洋科学",
            Self::HistoryCivilization => "历史学、考古学、哲学、宗教学、社会学、法学等人文社科",
            Self::IndustrialTechnology => "工业基础、纺织、动力电器、矿山、冶金、机械工程",
            Self::Mathematics => "数学",
            Self::Physics => "物理学、力学",
            Self::Chemistry => "化学、化学工程",
            Self::EnvironmentalScience => "环境科学技术、资源科学技术",
            Self::EnergyTechnology => "能源科学技术、核科学技术",
            Self::MilitaryTechnology => "军事学、军事工程技术",
            Self::ConstructionHydraulics => "测绘、水利工程、土木建筑工程",
            Self::Transportation => "交通运输工程",
            Self::Agriculture => "农学、水产学、林学、畜牧、兽医",
            Self::AerospaceNavigation => "航空航天科学技术",
            Self::HealthManagement => "心理学、食品科学技术",
            Self::ClinicalKnowledge => "基础医学、药学、中医学、临床医学、预防医学",
            Self::SafetyScience => "安全科学技术",
            Self::InformationTechnology => "信息科学、电子通信、计算机科学",
            Self::Biology => "生物学",
            Self::MaterialsScience => "材料科学",
            Self::Scientists => "科学家人物、科学家故事",
            Self::ScienceFiction => "科幻作品、科幻故事",
            Self::Other => "无法归类的其他内容",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order_matches_index() {
        for (i, category) in Category::ALL.iter().enumerate() {
            assert_eq!(category.index(), i);
        }
        assert_eq!(Category::ALL[0].as_str(), "天文地理");
        assert_eq!(Category::ALL[CATEGORY_COUNT - 1].as_str(), "其他");
    }

    #[test]
    fn test_from_str_roundtrips_names() {
        for category in Category::ALL {
            assert_eq!(Category::from_str(category.as_str()), Some(category));
        }
        assert_eq!(Category::from_str("烹饪"), None);
    }

    #[test]
    fn test_serde_uses_display_names() {
        let json = serde_json::to_string(&Category::MaterialsScience).unwrap();
        assert_eq!(json, "\"材料科学\"");
    }
}
