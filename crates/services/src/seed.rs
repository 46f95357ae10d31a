//! Procedurally generated practice questions for bootstrapping a bank.

use placement_core::model::{Category, Difficulty, QuestionDraft};

/// Generate `count` distinct questions for one bucket, numbered from `first`.
///
/// Every question has four numeric options; the position of the correct one
/// rotates with the question number.
#[must_use]
pub fn generated_drafts(
    category: Category,
    difficulty: Difficulty,
    first: u64,
    count: u64,
) -> Vec<QuestionDraft> {
    (first..first + count)
        .map(|n| {
            let (text, answer, radix) = template(category, difficulty, n);
            let mut options: Vec<String> = (0..4).map(|k| radix.render(answer + k)).collect();
            options.rotate_right(usize::try_from(n % 4).unwrap_or(0));
            QuestionDraft {
                category,
                difficulty,
                question_text: text,
                options,
                correct_answer: radix.render(answer),
                source: None,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum Radix {
    Decimal,
    Binary,
    Hex,
}

impl Radix {
    fn render(self, v: u64) -> String {
        match self {
            Radix::Decimal => v.to_string(),
            Radix::Binary => format!("{v:b}"),
            Radix::Hex => format!("0x{v:X}"),
        }
    }
}

fn template(category: Category, difficulty: Difficulty, n: u64) -> (String, u64, Radix) {
    use Radix::{Binary, Decimal, Hex};

    let a = n + 2;
    let b = n % 7 + 3;
    match (category, difficulty) {
        (Category::Mathematics, Difficulty::Easy) => {
            (format!("What is {a} + {b}?"), a + b, Decimal)
        }
        (Category::Mathematics, Difficulty::Medium) => {
            (format!("What is {a} × {b}?"), a * b, Decimal)
        }
        (Category::Mathematics, Difficulty::Hard) => (
            format!("What is {a}² + {b}²?"),
            a * a + b * b,
            Decimal,
        ),
        (Category::Reasoning, Difficulty::Easy) => (
            format!("Next in the sequence: {a}, {}, {}, ?", a + b, a + 2 * b),
            a + 3 * b,
            Decimal,
        ),
        (Category::Reasoning, Difficulty::Medium) => (
            format!("Next in the sequence: {a}, {}, {}, ?", a * 2, a * 4),
            a * 8,
            Decimal,
        ),
        (Category::Reasoning, Difficulty::Hard) => (
            format!(
                "Next in the sequence: {a}, {}, {}, {}, ?",
                a + 1,
                a + 3,
                a + 6
            ),
            a + 10,
            Decimal,
        ),
        (Category::Technical, Difficulty::Easy) => {
            (format!("How many bits are in {a} bytes?"), a * 8, Decimal)
        }
        (Category::Technical, Difficulty::Medium) => {
            (format!("What is {} in binary?", a + 10), a + 10, Binary)
        }
        (Category::Technical, Difficulty::Hard) => (
            format!("What is {} in hexadecimal?", a * 17),
            a * 17,
            Hex,
        ),
        (Category::Database, Difficulty::Easy) => (
            format!("A table holds {a} rows. What does SELECT COUNT(*) return?"),
            a,
            Decimal,
        ),
        (Category::Database, Difficulty::Medium) => (
            format!("How many rows does a CROSS JOIN of {a} and {b} rows produce?"),
            a * b,
            Decimal,
        ),
        (Category::Database, Difficulty::Hard) => (
            format!("A B-tree node of order {} holds at most how many keys?", a + 2),
            a + 1,
            Decimal,
        ),
    }
}
