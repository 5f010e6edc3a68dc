//! Prompt templates for test-case generation and script synthesis.

use crate::models::SearchHit;

/// Join retrieved chunk texts, best match first, separated by blank lines.
pub fn join_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| h.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt asking for a grounded test-case table.
pub fn test_case_prompt(context: &str, query: &str) -> String {
    format!(
        r#"Act as a QA Test Case Generator.
Based on the Context provided, generate a Test Case table for the User Request.

CONTEXT:
{context}

USER REQUEST:
{query}

STRICT OUTPUT RULES:
1. Output ONLY a Markdown Table.
2. Do NOT write any introductory text (like "Here are the test cases").
3. Do NOT write any conclusion or explanations.
4. The Table MUST have these exact columns: | Test_ID | Feature | Test_Scenario | Expected_Result | Grounded_In |
5. Write all text in simple text format
"#
    )
}

/// Prompt asking for a runnable Selenium script for one test case.
pub fn script_prompt(test_case: &str, rules: &str, html: &str) -> String {
    format!(
        r#"Act as a QA Automation Expert. Write a Python Selenium script.

TEST CASE: "{test_case}"
RULES: {rules}
HTML:
```html
{html}
```

REQUIREMENTS:
1. **Setup:** Use `webdriver_manager` with correct Selenium 4 syntax:
   ```python
   from selenium.webdriver.chrome.service import Service
   from webdriver_manager.chrome import ChromeDriverManager
   service = Service(ChromeDriverManager().install())
   driver = webdriver.Chrome(service=service)
   ```
2. **Path:** Check if 'checkout.html' is in the current folder OR 'project_assets'.

3. **Color Assertion:** Handle RGBA. Use this logic:
   `if "green" in color or "rgb(0, 128, 0)" in color or "rgba(0, 128, 0, 1)" in color:`

4. **Slow Motion:** Add `import time` and insert `time.sleep(3)` after every major action.

5. **Output:** Return ONLY the Python code block.
"#
    )
}
