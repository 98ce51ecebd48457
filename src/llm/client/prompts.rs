//! Prompt text for requirement-vector scoring and the connection check.

use crate::models::{Category, Record};

/// System instruction sent with every scoring request.
pub const SCORING_SYSTEM_PROMPT: &str = "你是一个专业且严格的科教资源评估专家。你必须仔细阅读每个资源的'科技领域'字段，这是评分的核心依据。不同的资源必须给出完全不同的评分。绝对禁止所有资源都给相同的分数。绝对禁止忽视资源的科技领域信息而给'科学家'或'其他'高分。";

pub const CONNECTION_TEST_SYSTEM_PROMPT: &str = "你是一个测试助手。";
pub const CONNECTION_TEST_USER_PROMPT: &str = "请用一句话回复：连接成功";

/// Placeholder for fields a record does not have.
pub const MISSING_FIELD: &str = "N/A";

/// `(label shown to the model, source column)` for each rendered field.
pub const RESOURCE_FIELDS: [(&str, &str); 5] = [
    ("资源名称", "资源名称"),
    ("科技领域", "科技领域"),
    ("资源类型", "资源类型"),
    ("适用学段", "适用学段"),
    ("课程类型", "如何课程类型(课程/非课程)"),
];

const SCORING_RULES: &str = r#"【核心评分原则 - 请严格执行！】
第一步：仔细阅读每个资源的各个字段，尤其是"资源名称"、"科技领域"、"文件名"等
第二步：将这些字段中的内容与上述22个领域进行匹配
第三步：对匹配上的领域给高分（0.8-0.9），相关领域给中等分（0.5-0.7），不相关给低分（0.1-0.2）

评分规则：
- 强相关（资源的科技领域字段中明确提到）：0.8-0.9
- 相关（需要该领域背景知识）：0.5-0.7
- 弱相关（轻微关联）：0.3-0.4
- 不相关（完全无关）：0.1-0.2

【严格禁止】
❌ 所有资源给相同分数（例如全都是"科学家":0.9, "其他":0.8）
❌ 给"科学家"、"其他"等通用领域过高分数（除非资源确实是关于科学家人物的）"#;

const WORKED_EXAMPLES: &str = r#"【评分示例】
示例1：资源名称"中国天眼：极目光年之外"，科技领域"科学与艺术；科学教育理论"
分析："中国天眼"是大型射电望远镜，内容以天文学观测为核心，涉及物理原理与工程技术，人物不是主线。
评分：{"天文地理":0.9, "历史文明":0.1, "工业技术":0.3, "数学":0.4, "物理":0.6, "化学":0.1, "环境科学":0.1, "能源科技":0.2, "军事科技":0.0, "建筑水利":0.3, "交通运输":0.1, "农林牧渔":0.0, "航空航天航海":0.4, "健康管理":0.0, "临床知识":0.0, "安全科学":0.2, "信息技术":0.4, "生物学":0.0, "材料科学":0.3, "科学家":0.2, "科学科幻":0.0, "其他":0.0}

示例2：资源名称"人工智能：未来已来"，科技领域"科学与艺术；科学教育理论"
分析：内容为人工智能科普，重点介绍AI的概念与应用，属于信息技术领域，数学为重要支撑，非科幻作品。
评分：{"天文地理":0.0, "历史文明":0.1, "工业技术":0.4, "数学":0.6, "物理":0.2, "化学":0.0, "环境科学":0.0, "能源科技":0.1, "军事科技":0.1, "建筑水利":0.0, "交通运输":0.1, "农林牧渔":0.0, "航空航天航海":0.1, "健康管理":0.1, "临床知识":0.0, "安全科学":0.3, "信息技术":0.9, "生物学":0.1, "材料科学":0.2, "科学家":0.1, "科学科幻":0.3, "其他":0.0}

示例3：资源名称"天眼之父南仁东"，科技领域"科学与艺术；科学教育理论"
分析：内容以科学家南仁东的科研经历与精神为主线，天文领域作为背景出现，人物叙事优先于具体学科。
评分：{"天文地理":0.6, "历史文明":0.3, "工业技术":0.3, "数学":0.2, "物理":0.4, "化学":0.0, "环境科学":0.0, "能源科技":0.1, "军事科技":0.0, "建筑水利":0.2, "交通运输":0.0, "农林牧渔":0.0, "航空航天航海":0.2, "健康管理":0.0, "临床知识":0.0, "安全科学":0.1, "信息技术":0.2, "生物学":0.0, "材料科学":0.2, "科学家":0.9, "科学科幻":0.0, "其他":0.0}"#;

/// Render one record as the numbered block the model sees.
fn render_resource(position: usize, record: &Record<'_>) -> String {
    let mut block = format!("资源 {}：", position);
    for (label, column) in RESOURCE_FIELDS {
        block.push_str(&format!("\n- {}：{}", label, record.field_or(column, MISSING_FIELD)));
    }
    block
}

/// The numbered 22-domain rubric.
pub fn render_rubric() -> String {
    Category::ALL
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {} - {}", i + 1, c.as_str(), c.scope()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the scoring prompt for a batch of records.
///
/// Deterministic for a given batch; the batch size appears both in the
/// introduction and in the output format so the model knows how many
/// objects to return.
pub fn build_vector_prompt(batch: &[Record<'_>]) -> String {
    let batch_size = batch.len();
    let resources = batch
        .iter()
        .enumerate()
        .map(|(i, record)| render_resource(i + 1, record))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"你是一个专业的科教资源分类评估专家。请仔细分析以下 {batch_size} 个科教资源，为每个资源评估完成其标注任务需要对各科技领域的知识掌握程度。

{resources}

【22个科技领域说明】
{rubric}

{rules}

【输出格式】
返回JSON数组，每个元素是一个资源的评分对象：
[
  {{
    "天文地理": 0.8,
    "历史文明": 0.3,
    ...（全部22个领域）
  }},
  ...（共{batch_size}个对象）
]
{examples}


只返回JSON数组，不要任何解释文字。"#,
        batch_size = batch_size,
        resources = resources,
        rubric = render_rubric(),
        rules = SCORING_RULES,
        examples = WORKED_EXAMPLES,
    )
}
