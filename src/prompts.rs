use std::path::Path;

use crate::host::ActiveDocument;

pub(crate) fn build_ask_preamble() -> String {
    "You are a coding assistant answering questions inside a terminal client.\n\
     Formatting the client understands:\n\
     - Put private reasoning in <thinking>...</thinking>.\n\
     - Put a step-by-step approach in <plan>...</plan>.\n\
     - Put a checklist in <todo>...</todo>, one item per line. Mark done items with [x] and urgent items with [high].\n\
     - Put short status notes in <feedback type=\"info|success|warning|error\">...</feedback>.\n\
     - Use fenced code blocks with a language tag for code.\n\
     Keep answers concise and concrete."
        .to_string()
}

pub(crate) fn build_edit_prompt(document: &ActiveDocument, instruction: &str) -> String {
    let path = document.path.display();
    let language = &document.language;
    let text = &document.text;
    format!(
        "You are editing a single file.\n\
         File: {path}\n\
         Language: {language}\n\
         Current content:\n\
         ```{language}\n\
         {text}\n\
         ```\n\
         Instruction:\n\
         {instruction}\n\
         Requirements:\n\
         - Reply with the complete updated file in exactly one fenced code block.\n\
         - The code block replaces the whole file, so never elide unchanged parts.\n\
         - Any explanation goes outside the code block and stays short."
    )
}

pub(crate) fn build_agent_prompt(root: &Path, listing: &str, task: &str) -> String {
    let root = root.display();
    format!(
        "You are a coding agent working inside a project folder.\n\
         Project root: {root}\n\
         Project structure:\n\
         {listing}\n\
         Task:\n\
         {task}\n\
         To change files, use these directives with paths relative to the project root:\n\
         CREATE_FILE: relative/path.ext\n\
         ```lang\n\
         <full file content>\n\
         ```\n\
         MODIFY_FILE: relative/path.ext\n\
         ```lang\n\
         <full new file content>\n\
         ```\n\
         DELETE_FILE: relative/path.ext\n\
         Requirements:\n\
         - MODIFY_FILE replaces the whole file; always send the complete content.\n\
         - Put each directive at the start of its own line.\n\
         - Never use absolute paths or paths outside the project root.\n\
         - Explain briefly what you changed and why."
    )
}

pub(crate) fn edit_success_message(path: &Path, language: &str) -> String {
    format!(
        "Updated {} ({language}) with the model's rewrite.",
        path.display()
    )
}
