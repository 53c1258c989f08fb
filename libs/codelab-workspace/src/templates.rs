//! Starter templates: built-in fallbacks and the server-side source

use crate::error::CollaboratorError;
use async_trait::async_trait;
use codelab_common::types::normalize_language;
use std::collections::HashMap;

/// Remote map of language -> starter source
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn fetch_templates(&self) -> Result<HashMap<String, String>, CollaboratorError>;
}

const PYTHON: &str = "def solve():\n    # Write your code here\n    pass\n\n\nif __name__ == \"__main__\":\n    solve()\n";

const JAVASCRIPT: &str = "const lines = require(\"fs\").readFileSync(0, \"utf8\").split(\"\\n\");\n\nfunction solve(lines) {\n  // Write your code here\n}\n\nsolve(lines);\n";

const TYPESCRIPT: &str = "const lines: string[] = require(\"fs\").readFileSync(0, \"utf8\").split(\"\\n\");\n\nfunction solve(lines: string[]): void {\n  // Write your code here\n}\n\nsolve(lines);\n";

const JAVA: &str = "import java.util.*;\n\npublic class Main {\n    public static void main(String[] args) {\n        Scanner sc = new Scanner(System.in);\n        // Write your code here\n    }\n}\n";

const CPP: &str = "#include <bits/stdc++.h>\nusing namespace std;\n\nint main() {\n    // Write your code here\n    return 0;\n}\n";

const C: &str = "#include <stdio.h>\n\nint main(void) {\n    /* Write your code here */\n    return 0;\n}\n";

const GO: &str = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\t// Write your code here\n\tfmt.Println()\n}\n";

const RUST: &str = "use std::io::{self, Read};\n\nfn main() {\n    let mut input = String::new();\n    io::stdin().read_to_string(&mut input).unwrap();\n    // Write your code here\n}\n";

/// Built-in starter code, used when no server template is available
pub fn fallback_template(language: &str) -> Option<&'static str> {
    match normalize_language(language).as_str() {
        "python" => Some(PYTHON),
        "javascript" => Some(JAVASCRIPT),
        "typescript" => Some(TYPESCRIPT),
        "java" => Some(JAVA),
        "cpp" => Some(CPP),
        "c" => Some(C),
        "go" => Some(GO),
        "rust" => Some(RUST),
        _ => None,
    }
}

/// Normalize the language keys of a fetched template map, dropping blank templates
pub fn normalize_template_map(raw: HashMap<String, String>) -> HashMap<String, String> {
    raw.into_iter()
        .filter(|(_, source)| !source.trim().is_empty())
        .map(|(language, source)| (normalize_language(&language), source))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallbacks_cover_common_languages() {
        for language in ["python", "javascript", "typescript", "java", "cpp", "c", "go", "rust"] {
            let template = fallback_template(language).unwrap();
            assert!(!template.is_empty(), "{} fallback is empty", language);
        }
    }

    #[test]
    fn test_fallback_resolves_aliases() {
        assert_eq!(fallback_template("py"), fallback_template("python"));
        assert_eq!(fallback_template("C++"), fallback_template("cpp"));
        assert!(fallback_template("brainfuck").is_none());
    }

    #[test]
    fn test_normalize_template_map() {
        let mut raw = HashMap::new();
        raw.insert("Python".to_string(), "print()".to_string());
        raw.insert("js".to_string(), "   ".to_string());
        let map = normalize_template_map(raw);
        assert_eq!(map.get("python").map(String::as_str), Some("print()"));
        assert!(!map.contains_key("javascript"));
        assert!(!map.contains_key("js"));
    }
}
