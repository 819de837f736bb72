// LLM prompt constants for the Generation module.

/// Stand-in for the tech stack when the request names none.
pub const NO_TECHSTACK: &str = "No specific technologies";

/// Question generation prompt. Replace `{role}`, `{level}`, `{techstack}`,
/// `{type}` and `{amount}` before sending.
pub const QUESTIONS_PROMPT_TEMPLATE: &str = r#"Prepare questions for a job interview.
The job role is {role}.
The job experience level is {level}.
The tech stack used in the job is: {techstack}.
The focus between behavioural and technical questions should lean towards: {type}.
The amount of questions required is: {amount}.
Please return only the questions, without any additional text.
The questions are going to be read by a voice assistant so do not use "/" or "*" or any other special characters which might break the voice assistant.
Return the questions formatted like this:
["Question 1", "Question 2", "Question 3"]
"#;
