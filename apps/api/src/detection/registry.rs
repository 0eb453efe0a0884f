//! Field Type Registry: the table every element is scored against.
//!
//! Rules are plain data (`RuleSpec`) compiled once into `FieldTypeRule`s. Declaration
//! order matters: it breaks score ties, first-declared wins. Adding a field type means
//! adding a row here, never touching the scoring code.

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::detection::models::FieldCategory;
use crate::errors::ConfigError;

use FieldCategory::*;

/// Uncompiled rule, as written in the built-in table.
#[derive(Debug, Clone, Copy)]
pub struct RuleSpec {
    pub field_type: &'static str,
    /// Case-insensitive regex fragments matched against the element's analysis text.
    pub keywords: &'static [&'static str],
    pub patterns: &'static [&'static str],
    pub accepted_kinds: &'static [&'static str],
    pub base_priority: u32,
    pub categories: &'static [FieldCategory],
}

/// A keyword with its source kept for tracing.
#[derive(Debug, Clone)]
pub struct Keyword {
    pub source: String,
    regex: Regex,
}

impl Keyword {
    pub fn is_match(&self, text: &str) -> bool {
        !text.is_empty() && self.regex.is_match(text)
    }
}

#[derive(Debug, Clone)]
pub struct FieldTypeRule {
    pub field_type: String,
    pub keywords: Vec<Keyword>,
    pub patterns: Vec<Regex>,
    pub accepted_kinds: Vec<String>,
    pub base_priority: u32,
    pub categories: Vec<FieldCategory>,
}

impl FieldTypeRule {
    /// First category is the primary one reported on a match.
    pub fn primary_category(&self) -> FieldCategory {
        self.categories[0]
    }

    pub fn accepts_kind(&self, kind: &str) -> bool {
        self.accepted_kinds.iter().any(|k| k == kind)
    }

    pub fn in_category(&self, category: FieldCategory) -> bool {
        self.categories.contains(&category)
    }

    pub fn info(&self) -> FieldTypeInfo {
        FieldTypeInfo {
            field_type: self.field_type.clone(),
            keywords: self.keywords.iter().map(|k| k.source.clone()).collect(),
            patterns: self.patterns.iter().map(|p| p.as_str().to_string()).collect(),
            accepted_kinds: self.accepted_kinds.clone(),
            base_priority: self.base_priority,
            categories: self.categories.clone(),
        }
    }
}

/// Serializable view of a rule for the listing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct FieldTypeInfo {
    pub field_type: String,
    pub keywords: Vec<String>,
    pub patterns: Vec<String>,
    pub accepted_kinds: Vec<String>,
    pub base_priority: u32,
    pub categories: Vec<FieldCategory>,
}

#[derive(Debug, Clone)]
pub struct FieldRegistry {
    rules: Vec<FieldTypeRule>,
}

impl FieldRegistry {
    /// Compiles the built-in table.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_specs(BUILTIN_RULES)
    }

    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(specs.len());

        for (idx, spec) in specs.iter().enumerate() {
            let field_type = spec.field_type.trim();
            if field_type.is_empty() {
                return Err(ConfigError::EmptyFieldType(idx));
            }
            if !seen.insert(field_type) {
                return Err(ConfigError::DuplicateFieldType(field_type.to_string()));
            }
            if spec.keywords.is_empty() && spec.patterns.is_empty() {
                return Err(ConfigError::NoSignals(field_type.to_string()));
            }
            if spec.categories.is_empty() {
                return Err(ConfigError::NoCategories(field_type.to_string()));
            }

            let keywords = spec
                .keywords
                .iter()
                .map(|&kw| {
                    compile(kw)
                        .map(|regex| Keyword {
                            source: kw.to_string(),
                            regex,
                        })
                        .map_err(|source| ConfigError::InvalidKeyword {
                            field_type: field_type.to_string(),
                            keyword: kw.to_string(),
                            source,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let patterns = spec
                .patterns
                .iter()
                .map(|&p| {
                    compile(p).map_err(|source| ConfigError::InvalidPattern {
                        field_type: field_type.to_string(),
                        pattern: p.to_string(),
                        source,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            rules.push(FieldTypeRule {
                field_type: field_type.to_string(),
                keywords,
                patterns,
                accepted_kinds: spec.accepted_kinds.iter().map(|k| k.to_string()).collect(),
                base_priority: spec.base_priority,
                categories: spec.categories.to_vec(),
            });
        }

        Ok(Self { rules })
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[FieldTypeRule] {
        &self.rules
    }

    pub fn get(&self, field_type: &str) -> Option<&FieldTypeRule> {
        self.rules.iter().find(|r| r.field_type == field_type)
    }

    pub fn contains(&self, field_type: &str) -> bool {
        self.get(field_type).is_some()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

fn compile(source: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source).case_insensitive(true).build()
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in table
// ────────────────────────────────────────────────────────────────────────────

pub const BUILTIN_RULES: &[RuleSpec] = &[
    // Personal
    RuleSpec {
        field_type: "firstName",
        keywords: &["first.?name", "fname", "given.?name", "名", "firstname", "name.?first", "prename"],
        patterns: &["firstName", "first_name", "name_first", "姓名.*名"],
        accepted_kinds: &["text"],
        base_priority: 10,
        categories: &[Personal],
    },
    RuleSpec {
        field_type: "lastName",
        keywords: &["last.?name", "lname", "family.?name", "surname", "姓", "lastname", "name.?last"],
        patterns: &["lastName", "last_name", "name_last", "姓名.*姓"],
        accepted_kinds: &["text"],
        base_priority: 10,
        categories: &[Personal],
    },
    RuleSpec {
        field_type: "fullName",
        keywords: &["full.?name", "name", "姓名", "complete.?name", "real.?name", "真实姓名"],
        patterns: &["fullName", "full_name", "realName", "真实姓名"],
        accepted_kinds: &["text"],
        base_priority: 9,
        categories: &[Personal],
    },
    RuleSpec {
        field_type: "email",
        keywords: &["email", "e.?mail", "邮箱", "电子邮件", "mail", "email.?address"],
        patterns: &["email", "mail", "邮箱"],
        accepted_kinds: &["email", "text"],
        base_priority: 10,
        categories: &[Personal],
    },
    RuleSpec {
        field_type: "phone",
        keywords: &["phone", "tel", "mobile", "电话", "手机", "telephone", "contact", "联系方式"],
        patterns: &["phone", "tel", "mobile", "电话", "手机"],
        accepted_kinds: &["tel", "text"],
        base_priority: 10,
        categories: &[Personal],
    },
    // Address
    RuleSpec {
        field_type: "address",
        keywords: &["address", "地址", "street", "location", "住址", "详细地址"],
        patterns: &["address", "street", "地址"],
        accepted_kinds: &["text", "textarea"],
        base_priority: 8,
        categories: &[Personal],
    },
    RuleSpec {
        field_type: "city",
        keywords: &["city", "城市", "town", "locality", "所在城市"],
        patterns: &["city", "town", "城市"],
        accepted_kinds: &["text", "select-one"],
        base_priority: 8,
        categories: &[Personal],
    },
    RuleSpec {
        field_type: "province",
        keywords: &["state", "province", "省", "州", "region", "省份"],
        patterns: &["state", "province", "省"],
        accepted_kinds: &["text", "select-one"],
        base_priority: 7,
        categories: &[Personal],
    },
    RuleSpec {
        field_type: "zipCode",
        keywords: &["zip", "postal", "邮编", "postcode", "zip.?code", "邮政编码"],
        patterns: &["zip", "postal", "邮编"],
        accepted_kinds: &["text"],
        base_priority: 6,
        categories: &[Personal],
    },
    // Education
    RuleSpec {
        field_type: "education",
        keywords: &["education", "school", "university", "college", "教育", "学校", "大学", "院校"],
        patterns: &["education", "school", "university", "college", "教育", "学校"],
        accepted_kinds: &["text", "textarea", "select-one"],
        base_priority: 9,
        categories: &[Education],
    },
    RuleSpec {
        field_type: "degree",
        keywords: &["degree", "qualification", "学位", "diploma", "学历"],
        patterns: &["degree", "qualification", "学位", "学历"],
        accepted_kinds: &["text", "select-one"],
        base_priority: 8,
        categories: &[Education],
    },
    RuleSpec {
        field_type: "major",
        keywords: &["major", "field", "study", "专业", "specialization", "学科"],
        patterns: &["major", "field", "专业", "学科"],
        accepted_kinds: &["text", "select-one"],
        base_priority: 8,
        categories: &[Education],
    },
    RuleSpec {
        field_type: "graduationDate",
        keywords: &["graduation", "graduate", "毕业时间", "毕业日期", "grad.?date"],
        patterns: &["graduation", "graduate", "毕业"],
        accepted_kinds: &["date", "text"],
        base_priority: 7,
        categories: &[Education],
    },
    // Experience
    RuleSpec {
        field_type: "currentCompany",
        keywords: &["company", "employer", "organization", "公司", "雇主", "单位", "现任公司"],
        patterns: &["company", "employer", "公司", "单位"],
        accepted_kinds: &["text"],
        base_priority: 9,
        categories: &[Experience],
    },
    RuleSpec {
        field_type: "currentPosition",
        keywords: &["position", "job.?title", "title", "role", "职位", "岗位", "职务"],
        patterns: &["position", "title", "role", "职位", "岗位"],
        accepted_kinds: &["text"],
        base_priority: 9,
        categories: &[Experience],
    },
    RuleSpec {
        field_type: "workExperience",
        keywords: &["experience", "work.?experience", "工作经验", "employment", "工作经历"],
        patterns: &["experience", "work", "employment", "工作经验", "工作经历"],
        accepted_kinds: &["textarea"],
        base_priority: 9,
        categories: &[Experience],
    },
    RuleSpec {
        field_type: "salary",
        keywords: &["salary", "wage", "pay", "薪资", "工资", "薪水", "期望薪资"],
        patterns: &["salary", "wage", "pay", "薪资", "工资"],
        accepted_kinds: &["text", "number"],
        base_priority: 7,
        categories: &[Experience],
    },
    // Projects
    RuleSpec {
        field_type: "projectName",
        keywords: &["project", "project.?name", "项目名称", "项目", "project.?title"],
        patterns: &["project.*name", "project.*title", "项目名称", "项目标题"],
        accepted_kinds: &["text"],
        base_priority: 8,
        categories: &[Project],
    },
    RuleSpec {
        field_type: "projectDescription",
        keywords: &["project.?desc", "project.?detail", "项目描述", "项目详情"],
        patterns: &["project.*desc", "project.*detail", "项目描述", "项目详情"],
        accepted_kinds: &["textarea"],
        base_priority: 8,
        categories: &[Project],
    },
    RuleSpec {
        field_type: "projectRole",
        keywords: &["project.?role", "项目角色", "担任角色", "role.?in.?project"],
        patterns: &["project.*role", "role.*project", "项目角色"],
        accepted_kinds: &["text"],
        base_priority: 7,
        categories: &[Project],
    },
    // Skills
    RuleSpec {
        field_type: "skills",
        keywords: &["skill", "skills", "技能", "competencies", "abilities", "专业技能"],
        patterns: &["skill", "competenc", "abilit", "技能", "专长"],
        accepted_kinds: &["textarea", "text"],
        base_priority: 9,
        categories: &[Skills],
    },
    RuleSpec {
        field_type: "languages",
        keywords: &["language", "languages", "语言", "外语", "foreign.?language"],
        patterns: &["language", "语言", "外语"],
        accepted_kinds: &["text", "textarea"],
        base_priority: 7,
        categories: &[Skills],
    },
    RuleSpec {
        field_type: "certifications",
        keywords: &["certification", "certificate", "证书", "资格证", "license"],
        patterns: &["certif", "license", "证书", "资格"],
        accepted_kinds: &["text", "textarea"],
        base_priority: 7,
        categories: &[Skills],
    },
    // Social
    RuleSpec {
        field_type: "linkedin",
        keywords: &["linkedin", "linked.?in", r"\bli\b", "linkedin.?url"],
        patterns: &["linkedin", "li.*profile"],
        accepted_kinds: &["url", "text"],
        base_priority: 8,
        categories: &[Social],
    },
    RuleSpec {
        field_type: "github",
        keywords: &["github", "git.?hub", "github.?url"],
        patterns: &["github", "git.*hub"],
        accepted_kinds: &["url", "text"],
        base_priority: 7,
        categories: &[Social],
    },
    RuleSpec {
        field_type: "website",
        keywords: &["website", "web.?site", "homepage", "portfolio", "个人网站", "personal.?site"],
        patterns: &["website", "homepage", "portfolio", "个人网站"],
        accepted_kinds: &["url", "text"],
        base_priority: 6,
        categories: &[Social],
    },
    // Free text
    RuleSpec {
        field_type: "summary",
        keywords: &["summary", "objective", "about", "bio", "简介", "自我介绍", "profile", "个人简介"],
        patterns: &["summary", "objective", "about", "bio", "简介", "自我介绍"],
        accepted_kinds: &["textarea"],
        base_priority: 8,
        categories: &[Other],
    },
    RuleSpec {
        field_type: "coverLetter",
        keywords: &["cover.?letter", "letter", "求职信", "motivation", "动机信"],
        patterns: &["cover.*letter", "求职信", "动机"],
        accepted_kinds: &["textarea"],
        base_priority: 6,
        categories: &[Other],
    },
    RuleSpec {
        field_type: "expectedSalary",
        keywords: &["expected.?salary", "salary.?expectation", "期望薪资", "薪资期望"],
        patterns: &["expected.*salary", "salary.*expect", "期望薪资"],
        accepted_kinds: &["text", "number"],
        base_priority: 7,
        categories: &[Other],
    },
    // Uploads
    RuleSpec {
        field_type: "resume",
        keywords: &["resume", "cv", "简历", "curriculum"],
        patterns: &["resume", "cv", "简历"],
        accepted_kinds: &["file"],
        base_priority: 5,
        categories: &[FieldCategory::File],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: RuleSpec = RuleSpec {
        field_type: "email",
        keywords: &["email"],
        patterns: &[],
        accepted_kinds: &["email"],
        base_priority: 10,
        categories: &[Personal],
    };

    #[test]
    fn test_builtin_table_compiles() {
        let registry = FieldRegistry::builtin().unwrap();
        assert_eq!(registry.len(), BUILTIN_RULES.len());
        assert!(registry.contains("email"));
        assert!(registry.contains("currentCompany"));
        assert!(registry.contains("resume"));
    }

    #[test]
    fn test_declaration_order_is_preserved() {
        let registry = FieldRegistry::builtin().unwrap();
        let names: Vec<&str> = registry.rules().iter().map(|r| r.field_type.as_str()).collect();
        assert_eq!(&names[..3], &["firstName", "lastName", "fullName"]);
        assert_eq!(names.last(), Some(&"resume"));
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let registry = FieldRegistry::builtin().unwrap();
        let first = registry.get("firstName").unwrap();
        assert!(first.keywords[0].is_match("Applicant First Name"));
        assert!(first.patterns[0].is_match("firstname"));
    }

    #[test]
    fn test_keyword_never_matches_empty_text() {
        let registry = FieldRegistry::builtin().unwrap();
        let email = registry.get("email").unwrap();
        assert!(!email.keywords[0].is_match(""));
    }

    #[test]
    fn test_linkedin_short_keyword_is_word_bounded() {
        let registry = FieldRegistry::builtin().unwrap();
        let linkedin = registry.get("linkedin").unwrap();
        let li = linkedin.keywords.iter().find(|k| k.source == r"\bli\b").unwrap();
        assert!(li.is_match("li url"));
        assert!(!li.is_match("client policy"));
    }

    #[test]
    fn test_invalid_keyword_fails_fast() {
        let bad = RuleSpec {
            keywords: &["first(name"],
            ..BASE
        };
        let err = FieldRegistry::from_specs(&[bad]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKeyword { .. }));
    }

    #[test]
    fn test_invalid_pattern_fails_fast() {
        let bad = RuleSpec {
            patterns: &["[unclosed"],
            ..BASE
        };
        let err = FieldRegistry::from_specs(&[bad]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_duplicate_field_type_rejected() {
        let err = FieldRegistry::from_specs(&[BASE, BASE]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateFieldType(ref name) if name == "email"));
    }

    #[test]
    fn test_rule_without_signals_rejected() {
        let bad = RuleSpec {
            keywords: &[],
            patterns: &[],
            ..BASE
        };
        assert!(matches!(
            FieldRegistry::from_specs(&[bad]),
            Err(ConfigError::NoSignals(_))
        ));
    }

    #[test]
    fn test_rule_without_categories_rejected() {
        let bad = RuleSpec {
            categories: &[],
            ..BASE
        };
        assert!(matches!(
            FieldRegistry::from_specs(&[bad]),
            Err(ConfigError::NoCategories(_))
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        let bad = RuleSpec {
            field_type: "  ",
            ..BASE
        };
        assert!(matches!(
            FieldRegistry::from_specs(&[bad]),
            Err(ConfigError::EmptyFieldType(0))
        ));
    }

    #[test]
    fn test_info_exposes_sources() {
        let registry = FieldRegistry::builtin().unwrap();
        let info = registry.get("phone").unwrap().info();
        assert!(info.keywords.contains(&"mobile".to_string()));
        assert_eq!(info.accepted_kinds, vec!["tel", "text"]);
        assert_eq!(info.categories, vec![Personal]);
    }
}
