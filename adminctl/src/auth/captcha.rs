//! Login captcha.
//!
//! Challenges are small arithmetic questions. Answers are kept in a bounded in-memory cache with a
//! TTL and removed on the first verification attempt, right or wrong.

use async_trait::async_trait;
use moka::future::Cache;
use rand::prelude::RngExt;
use rand::rng;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::config::CaptchaConfig;

#[derive(Debug, Clone, Serialize)]
pub struct CaptchaChallenge {
    pub captcha_id: String,
    /// Question shown to the user, e.g. `"7 + 5 = ?"`
    pub challenge: String,
}

#[async_trait]
pub trait CaptchaProvider: Send + Sync {
    async fn generate(&self) -> CaptchaChallenge;

    /// Check an answer. A challenge can only be verified once.
    async fn verify(&self, captcha_id: &str, answer: &str) -> bool;
}

pub struct ArithmeticCaptcha {
    answers: Cache<String, String>,
}

impl ArithmeticCaptcha {
    pub fn new(ttl: Duration, max_outstanding: u64) -> Self {
        Self {
            answers: Cache::builder().max_capacity(max_outstanding).time_to_live(ttl).build(),
        }
    }

    pub fn from_config(config: &CaptchaConfig) -> Self {
        Self::new(config.ttl, config.max_outstanding)
    }
}

fn make_question() -> (String, i32) {
    let mut rng = rng();
    let a: i32 = rng.random_range(1..=20);
    let b: i32 = rng.random_range(1..=20);
    match rng.random_range(0..3) {
        0 => (format!("{a} + {b} = ?"), a + b),
        1 => {
            let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
            (format!("{hi} - {lo} = ?"), hi - lo)
        }
        _ => {
            let (a, b) = (a % 10 + 1, b % 10 + 1);
            (format!("{a} x {b} = ?"), a * b)
        }
    }
}

#[async_trait]
impl CaptchaProvider for ArithmeticCaptcha {
    async fn generate(&self) -> CaptchaChallenge {
        let (challenge, answer) = make_question();
        let captcha_id = Uuid::new_v4().simple().to_string();
        self.answers.insert(captcha_id.clone(), answer.to_string()).await;

        CaptchaChallenge { captcha_id, challenge }
    }

    async fn verify(&self, captcha_id: &str, answer: &str) -> bool {
        match self.answers.remove(captcha_id).await {
            Some(expected) => expected == answer.trim(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solve(challenge: &str) -> i32 {
        let parts: Vec<&str> = challenge.split_whitespace().collect();
        let a: i32 = parts[0].parse().unwrap();
        let b: i32 = parts[2].parse().unwrap();
        match parts[1] {
            "+" => a + b,
            "-" => a - b,
            "x" => a * b,
            op => panic!("unexpected operator {op}"),
        }
    }

    #[tokio::test]
    async fn test_correct_answer_verifies_once() {
        let captcha = ArithmeticCaptcha::new(Duration::from_secs(60), 100);
        let challenge = captcha.generate().await;
        let answer = solve(&challenge.challenge).to_string();

        assert!(captcha.verify(&challenge.captcha_id, &answer).await);
        assert!(!captcha.verify(&challenge.captcha_id, &answer).await);
    }

    #[tokio::test]
    async fn test_wrong_answer_consumes_challenge() {
        let captcha = ArithmeticCaptcha::new(Duration::from_secs(60), 100);
        let challenge = captcha.generate().await;
        let answer = solve(&challenge.challenge);

        assert!(!captcha.verify(&challenge.captcha_id, &(answer + 1).to_string()).await);
        assert!(!captcha.verify(&challenge.captcha_id, &answer.to_string()).await);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let captcha = ArithmeticCaptcha::new(Duration::from_secs(60), 100);
        assert!(!captcha.verify("nope", "1").await);
    }

    #[test]
    fn test_questions_have_non_negative_answers() {
        for _ in 0..500 {
            let (question, answer) = make_question();
            assert!(answer >= 0, "{question} -> {answer}");
            assert_eq!(solve(&question), answer);
        }
    }
}
