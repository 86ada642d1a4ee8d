use crate::error::{Error, Result};
use crate::models::question::{QuestionType, QuestionWithOptions};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct GradedQuestion {
    pub question_id: Uuid,
    pub correct: bool,
    /// Option texts a correct submission would have to hit: the flagged
    /// options for choice questions, every option for short-text ones.
    pub correct_options: Vec<String>,
    pub submitted: JsonValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizReport {
    pub score: i32,
    pub total: i32,
    pub percent: i32,
    pub passed: bool,
    pub details: Vec<GradedQuestion>,
}

pub struct GradingService;

impl GradingService {
    /// Grades a submission against already-fetched questions. Pure, no I/O.
    /// A quiz with no questions is rejected rather than dividing by zero.
    pub fn check_quiz(
        questions: &[QuestionWithOptions],
        answers: &HashMap<Uuid, JsonValue>,
        pass_threshold: i32,
    ) -> Result<QuizReport> {
        if questions.is_empty() {
            return Err(Error::BadRequest(
                "Quiz has no questions and cannot be submitted".to_string(),
            ));
        }

        let mut details = Vec::with_capacity(questions.len());
        let mut correct_count: i32 = 0;

        for q in questions {
            let submitted = answers
                .get(&q.question.id)
                .cloned()
                .unwrap_or(JsonValue::Null);
            let correct = Self::check_question(q, &submitted);
            if correct {
                correct_count += 1;
            }

            let correct_options = match q.question.question_type {
                QuestionType::ShortText => q.options.iter().map(|o| o.text.clone()).collect(),
                _ => q
                    .options
                    .iter()
                    .filter(|o| o.is_correct)
                    .map(|o| o.text.clone())
                    .collect(),
            };

            details.push(GradedQuestion {
                question_id: q.question.id,
                correct,
                correct_options,
                submitted,
            });
        }

        let total = questions.len() as i32;
        let percent = (f64::from(correct_count) * 100.0 / f64::from(total)).round() as i32;
        let passed = percent >= pass_threshold;

        Ok(QuizReport {
            score: correct_count,
            total,
            percent,
            passed,
            details,
        })
    }

    fn check_question(q: &QuestionWithOptions, submitted: &JsonValue) -> bool {
        match q.question.question_type {
            QuestionType::ShortText => {
                let Some(text) = submitted.as_str() else {
                    return false;
                };
                let normalized = text.trim().to_lowercase();
                q.options
                    .iter()
                    .any(|o| o.text.trim().to_lowercase() == normalized)
            }
            QuestionType::SingleChoice | QuestionType::Dropdown => {
                let Some(selected) = parse_uuid(submitted) else {
                    return false;
                };
                q.options.iter().any(|o| o.is_correct && o.id == selected)
            }
            QuestionType::MultiChoice => {
                let Some(selected) = parse_uuid_set(submitted) else {
                    return false;
                };
                let expected: HashSet<Uuid> = q
                    .options
                    .iter()
                    .filter(|o| o.is_correct)
                    .map(|o| o.id)
                    .collect();
                selected == expected
            }
        }
    }
}

fn parse_uuid(value: &JsonValue) -> Option<Uuid> {
    value.as_str().and_then(|s| Uuid::parse_str(s).ok())
}

fn parse_uuid_set(value: &JsonValue) -> Option<HashSet<Uuid>> {
    let arr = value.as_array()?;
    let mut set = HashSet::with_capacity(arr.len());
    for item in arr {
        set.insert(parse_uuid(item)?);
    }
    Some(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Question, QuestionOption};
    use chrono::Utc;
    use serde_json::json;

    fn option(question_id: Uuid, text: &str, is_correct: bool, position: i32) -> QuestionOption {
        QuestionOption {
            id: Uuid::new_v4(),
            question_id,
            text: text.to_string(),
            is_correct,
            position,
            created_at: Utc::now(),
        }
    }

    fn question(
        question_type: QuestionType,
        options: Vec<(&str, bool)>,
    ) -> QuestionWithOptions {
        let id = Uuid::new_v4();
        QuestionWithOptions {
            question: Question {
                id,
                quiz_id: Uuid::new_v4(),
                question_type,
                text: "q".to_string(),
                position: 1,
                required: true,
                created_at: Utc::now(),
            },
            options: options
                .into_iter()
                .enumerate()
                .map(|(i, (text, correct))| option(id, text, correct, i as i32 + 1))
                .collect(),
        }
    }

    fn answers_for(pairs: Vec<(Uuid, JsonValue)>) -> HashMap<Uuid, JsonValue> {
        pairs.into_iter().collect()
    }

    #[test]
    fn single_choice_correct_iff_flagged_option_selected() {
        let q = question(QuestionType::SingleChoice, vec![("A", true), ("B", false)]);
        let correct_id = q.options[0].id;
        let wrong_id = q.options[1].id;

        let report = GradingService::check_quiz(
            std::slice::from_ref(&q),
            &answers_for(vec![(q.question.id, json!(correct_id.to_string()))]),
            50,
        )
        .unwrap();
        assert!(report.details[0].correct);

        let report = GradingService::check_quiz(
            std::slice::from_ref(&q),
            &answers_for(vec![(q.question.id, json!(wrong_id.to_string()))]),
            50,
        )
        .unwrap();
        assert!(!report.details[0].correct);
    }

    #[test]
    fn multi_choice_requires_exact_set_equality() {
        let q = question(
            QuestionType::MultiChoice,
            vec![("A", true), ("B", true), ("C", false)],
        );
        let a = q.options[0].id.to_string();
        let b = q.options[1].id.to_string();
        let c = q.options[2].id.to_string();

        let exact = answers_for(vec![(q.question.id, json!([a.clone(), b.clone()]))]);
        let subset = answers_for(vec![(q.question.id, json!([a.clone()]))]);
        let superset = answers_for(vec![(q.question.id, json!([a, b, c]))]);

        let qs = std::slice::from_ref(&q);
        assert!(GradingService::check_quiz(qs, &exact, 50).unwrap().details[0].correct);
        assert!(!GradingService::check_quiz(qs, &subset, 50).unwrap().details[0].correct);
        assert!(!GradingService::check_quiz(qs, &superset, 50).unwrap().details[0].correct);
    }

    #[test]
    fn short_text_is_trimmed_and_case_insensitive_both_sides() {
        let q = question(QuestionType::ShortText, vec![("paris", false), ("Paris ", false)]);
        let report = GradingService::check_quiz(
            std::slice::from_ref(&q),
            &answers_for(vec![(q.question.id, json!(" PARIS "))]),
            50,
        )
        .unwrap();
        assert!(report.details[0].correct);

        let report = GradingService::check_quiz(
            std::slice::from_ref(&q),
            &answers_for(vec![(q.question.id, json!("london"))]),
            50,
        )
        .unwrap();
        assert!(!report.details[0].correct);
    }

    #[test]
    fn dropdown_grades_like_single_choice() {
        let q = question(QuestionType::Dropdown, vec![("A", false), ("B", true)]);
        let report = GradingService::check_quiz(
            std::slice::from_ref(&q),
            &answers_for(vec![(q.question.id, json!(q.options[1].id.to_string()))]),
            50,
        )
        .unwrap();
        assert!(report.details[0].correct);
    }

    #[test]
    fn percent_and_pass_match_the_worked_example() {
        // Q1 single-choice with correct option A, Q2 short-text accepting
        // "paris" / "Paris ", threshold 50.
        let q1 = question(QuestionType::SingleChoice, vec![("A", true), ("B", false)]);
        let q2 = question(QuestionType::ShortText, vec![("paris", false), ("Paris ", false)]);
        let questions = vec![q1.clone(), q2.clone()];

        let all_right = answers_for(vec![
            (q1.question.id, json!(q1.options[0].id.to_string())),
            (q2.question.id, json!(" PARIS ")),
        ]);
        let report = GradingService::check_quiz(&questions, &all_right, 50).unwrap();
        assert_eq!(report.score, 2);
        assert_eq!(report.percent, 100);
        assert!(report.passed);

        let all_wrong = answers_for(vec![
            (q1.question.id, json!(q1.options[1].id.to_string())),
            (q2.question.id, json!("london")),
        ]);
        let report = GradingService::check_quiz(&questions, &all_wrong, 50).unwrap();
        assert_eq!(report.score, 0);
        assert_eq!(report.percent, 0);
        assert!(!report.passed);
    }

    #[test]
    fn percent_rounds_to_nearest_integer() {
        let q1 = question(QuestionType::SingleChoice, vec![("A", true)]);
        let q2 = question(QuestionType::SingleChoice, vec![("A", true)]);
        let q3 = question(QuestionType::SingleChoice, vec![("A", true)]);
        let questions = vec![q1.clone(), q2, q3];

        let one_right = answers_for(vec![(
            q1.question.id,
            json!(q1.options[0].id.to_string()),
        )]);
        let report = GradingService::check_quiz(&questions, &one_right, 50).unwrap();
        // 1/3 -> 33.33 -> 33
        assert_eq!(report.percent, 33);
        assert!(!report.passed);
    }

    #[test]
    fn missing_answer_counts_as_incorrect() {
        let q = question(QuestionType::SingleChoice, vec![("A", true)]);
        let report =
            GradingService::check_quiz(std::slice::from_ref(&q), &HashMap::new(), 50).unwrap();
        assert!(!report.details[0].correct);
        assert_eq!(report.percent, 0);
    }

    #[test]
    fn empty_quiz_is_rejected() {
        let err = GradingService::check_quiz(&[], &HashMap::new(), 50).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }
}
