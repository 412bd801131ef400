//! Fixed prompt text.
//!
//! The system prompt pins the output format that [`crate::parse`] expects:
//! `#N. Name` headers followed by the labels from [`crate::parse::LABELS`].

pub const SYSTEM_PROMPT: &str = "You are a helpful and maximally truthful AI analyst. \
Analyze web3 projects based on their GitHub repos for launched tokens. For each project, \
search the web thoroughly for official information on whether they have a launched token, \
including token name, ticker, and launch date if applicable. Use the search_web tool multiple \
times if needed for accuracy.

Structure your response exactly in this format for each project, one after another:

#Номер. Назва Проекту
GitHub URL: https://github.com/...
Наявність запущеного токена: Так or Ні
Назва токена: Тікер (якщо Так, інакше -)
Примітки: Детальний аналіз, включаючи дату запуску якщо є, і джерела.

Separate projects with a blank line. Respond in Ukrainian.";

pub const BASE_INSTRUCTION: &str = "Привіт, проведи аналіз web3 проектів, Github яких я тобі надіслав, на наявність запущеного токена.";

/// Base instruction followed by one URL per line.
pub fn chunk_prompt(base: &str, urls: &[String]) -> String {
    let mut out = String::with_capacity(base.len() + urls.iter().map(|u| u.len() + 1).sum::<usize>());
    out.push_str(base);
    for u in urls {
        out.push('\n');
        out.push_str(u);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_prompt_puts_each_url_on_its_own_line() {
        let urls = vec![
            "https://github.com/a/x".to_string(),
            "https://github.com/b/y".to_string(),
        ];
        let p = chunk_prompt("base", &urls);
        assert_eq!(p, "base\nhttps://github.com/a/x\nhttps://github.com/b/y");
    }

    #[test]
    fn system_prompt_names_every_parsed_label() {
        for (label, _) in crate::parse::LABELS.iter().take(4) {
            assert!(SYSTEM_PROMPT.contains(label), "missing label {label}");
        }
    }
}
