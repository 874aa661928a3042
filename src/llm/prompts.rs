// Fixed instructions sent with every extraction request.

const RULES: &str = r#"Rules:
- Return ONLY a JSON array. Each element has exactly these keys: "date", "description", "amount", "category".
- "amount" is a number: negative = expense (money out), positive = income (money in).
- "date" uses the format YYYY-MM-DD.
- "category" is a short spending category such as "Groceries", "Rent" or "Salary".
- If there are no transactions, return []."#;

const EXAMPLE: &str = r#"[{"date": "2024-01-15", "description": "Store", "amount": -25.99, "category": "Shopping"}]"#;

pub fn text_instruction() -> String {
    format!(
        "Extract every transaction from the bank statement text that follows as a JSON array like:\n{}\n\n{}",
        EXAMPLE, RULES
    )
}

pub fn image_instruction() -> String {
    format!(
        "Extract ALL transactions from this statement or receipt image as a JSON array like:\n{}\n\n{}",
        EXAMPLE, RULES
    )
}
