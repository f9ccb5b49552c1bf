//! Task-definition grammar parser: `T=<period>,D=<deadline>,pr=<priority>,[<section>...]`
//! with sections `(R<id>,avg=<n>,dev=<n>)`, grounded on `task_params_init_str`
//! (`task.c`) and the line-skipping/capacity rules of `taskset_init_file`
//! (`taskset.c`).

use crate::domain::{ParseError, Priority, TaskSetError};

pub const MAX_TASKSET_SIZE: usize = 20;
pub const MAX_TASK_SECTIONS: usize = 10;
pub const MAX_RESOURCES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpec {
    pub resource_id: u32,
    pub work_avg: u64,
    pub work_dev: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub id: u32,
    pub period_ms: u64,
    pub deadline_ms: u64,
    pub priority: Priority,
    pub phase_ms: u64,
    pub sections: Vec<SectionSpec>,
}

/// Parses one non-empty, non-comment line into a [`TaskSpec`]. `line`
/// must already have had its trailing newline stripped.
pub fn parse_task_line(line: &str, line_no: usize, id: u32) -> Result<TaskSpec, ParseError> {
    let rest = line.trim_start();
    let rest = rest
        .strip_prefix('T')
        .and_then(|r| r.trim_start().strip_prefix('='))
        .ok_or_else(|| malformed(line_no, line))?;

    let (period_ms, rest) = take_uint(rest).ok_or_else(|| malformed(line_no, line))?;
    let rest = rest.trim_start().strip_prefix(',').ok_or_else(|| malformed(line_no, line))?;
    let rest = rest.trim_start().strip_prefix("D=").ok_or_else(|| malformed(line_no, line))?;
    let (deadline_ms, rest) = take_uint(rest).ok_or_else(|| malformed(line_no, line))?;
    let rest = rest.trim_start().strip_prefix(',').ok_or_else(|| malformed(line_no, line))?;
    let rest = rest.trim_start().strip_prefix("pr=").ok_or_else(|| malformed(line_no, line))?;
    let (priority_raw, rest) = take_uint(rest).ok_or_else(|| malformed(line_no, line))?;
    let rest = rest.trim_start().strip_prefix(',').ok_or_else(|| malformed(line_no, line))?;
    let mut rest = rest.trim_start().strip_prefix('[').ok_or_else(|| malformed(line_no, line))?;

    let priority = Priority::new(priority_raw as u32).ok_or(ParseError::PriorityOutOfRange {
        line: line_no,
        priority: priority_raw as u32,
        max: Priority::MAX,
    })?;

    let mut sections = Vec::new();
    let mut too_many_sections_warned = false;
    let mut too_many_resources_warned = false;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix(']') {
            rest = after;
            break;
        }
        let (section, remainder) = parse_section(trimmed, line_no)?;
        rest = remainder;

        if section.resource_id != 0 && section.resource_id as usize > MAX_RESOURCES {
            if !too_many_resources_warned {
                log::warn!(
                    "{}",
                    TaskSetError::TooManyResources {
                        id: section.resource_id,
                        max: MAX_RESOURCES,
                    }
                );
                too_many_resources_warned = true;
            }
            continue;
        }
        if sections.len() >= MAX_TASK_SECTIONS {
            if !too_many_sections_warned {
                log::warn!(
                    "{}",
                    TaskSetError::TooManySections {
                        task: id,
                        max: MAX_TASK_SECTIONS,
                    }
                );
                too_many_sections_warned = true;
            }
            continue;
        }
        sections.push(section);
    }
    let _ = rest;

    Ok(TaskSpec {
        id,
        period_ms,
        deadline_ms,
        priority,
        phase_ms: 0,
        sections,
    })
}

fn parse_section(s: &str, line_no: usize) -> Result<(SectionSpec, &str), ParseError> {
    let orig = s;
    let rest = s.strip_prefix("(R").ok_or_else(|| bad_section(line_no, orig))?;
    let (resource_id, rest) = take_uint(rest).ok_or_else(|| bad_section(line_no, orig))?;
    let rest = rest.strip_prefix(",avg=").ok_or_else(|| bad_section(line_no, orig))?;
    let (work_avg, rest) = take_uint(rest).ok_or_else(|| bad_section(line_no, orig))?;
    let rest = rest.strip_prefix(",dev=").ok_or_else(|| bad_section(line_no, orig))?;
    let (work_dev, rest) = take_uint(rest).ok_or_else(|| bad_section(line_no, orig))?;
    let rest = rest.strip_prefix(')').ok_or_else(|| bad_section(line_no, orig))?;
    Ok((
        SectionSpec {
            resource_id: resource_id as u32,
            work_avg,
            work_dev,
        },
        rest,
    ))
}

fn take_uint(s: &str) -> Option<(u64, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let value: u64 = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

fn malformed(line: usize, text: &str) -> ParseError {
    ParseError::Malformed {
        line,
        text: text.to_string(),
    }
}

fn bad_section(line: usize, section: &str) -> ParseError {
    ParseError::BadSection {
        line,
        section: section.to_string(),
    }
}

/// Parses every line of a task-set source, skipping blank/comment lines,
/// stopping early at `MAX_TASKSET_SIZE`, and logging+skipping any line
/// that fails to parse — matching `taskset_init_file`'s tolerant loop.
pub fn parse_task_set(source: &str) -> (Vec<TaskSpec>, Vec<ParseError>) {
    let mut specs = Vec::new();
    let mut errors = Vec::new();

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw_line.trim_end();
        if trimmed.is_empty() || trimmed.trim_start().starts_with('#') {
            continue;
        }
        if specs.len() >= MAX_TASKSET_SIZE {
            log::warn!(
                "{}",
                TaskSetError::TooManyTasks {
                    line: line_no,
                    max: MAX_TASKSET_SIZE,
                }
            );
            continue;
        }
        match parse_task_line(trimmed, line_no, specs.len() as u32) {
            Ok(spec) => specs.push(spec),
            Err(e) => errors.push(e),
        }
    }

    (specs, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_section() {
        let spec = parse_task_line("T=100,D=100,pr=10,[(R1,avg=500,dev=10)]", 1, 0).unwrap();
        assert_eq!(spec.period_ms, 100);
        assert_eq!(spec.deadline_ms, 100);
        assert_eq!(spec.priority.get(), 10);
        assert_eq!(spec.sections.len(), 1);
        assert_eq!(spec.sections[0], SectionSpec { resource_id: 1, work_avg: 500, work_dev: 10 });
    }

    #[test]
    fn parses_no_sections() {
        let spec = parse_task_line("T=50,D=50,pr=5,[]", 1, 0).unwrap();
        assert!(spec.sections.is_empty());
    }

    #[test]
    fn parses_multiple_sections() {
        let spec = parse_task_line(
            "T=100,D=100,pr=10,[(R1,avg=500,dev=0)(R2,avg=200,dev=5)]",
            1,
            0,
        )
        .unwrap();
        assert_eq!(spec.sections.len(), 2);
        assert_eq!(spec.sections[1].resource_id, 2);
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(parse_task_line("garbage", 1, 0).is_err());
    }

    #[test]
    fn rejects_priority_out_of_range() {
        let err = parse_task_line("T=100,D=100,pr=150,[]", 1, 0).unwrap_err();
        assert!(matches!(err, ParseError::PriorityOutOfRange { .. }));
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        let src = "# a comment\n\nT=100,D=100,pr=10,[]\n";
        let (specs, errors) = parse_task_set(src);
        assert_eq!(specs.len(), 1);
        assert!(errors.is_empty());
    }

    #[test]
    fn skips_unparseable_lines_and_keeps_going() {
        let src = "T=100,D=100,pr=10,[]\nnonsense\nT=50,D=50,pr=5,[]\n";
        let (specs, errors) = parse_task_set(src);
        assert_eq!(specs.len(), 2);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn drops_sections_past_max_task_sections_instead_of_failing_the_line() {
        let mut line = "T=100,D=100,pr=10,[".to_string();
        for r in 1..=MAX_TASK_SECTIONS + 4 {
            line.push_str(&format!("(R{r},avg=1,dev=0)"));
        }
        line.push(']');
        let spec = parse_task_line(&line, 1, 0).unwrap();
        assert_eq!(spec.sections.len(), MAX_TASK_SECTIONS);
    }

    #[test]
    fn drops_sections_naming_a_resource_past_max_resources() {
        let line = format!("T=100,D=100,pr=10,[(R{},avg=1,dev=0)(R1,avg=2,dev=0)]", MAX_RESOURCES + 1);
        let spec = parse_task_line(&line, 1, 0).unwrap();
        assert_eq!(spec.sections.len(), 1);
        assert_eq!(spec.sections[0].resource_id, 1);
    }

    #[test]
    fn truncates_at_max_taskset_size() {
        let mut src = String::new();
        for _ in 0..MAX_TASKSET_SIZE + 3 {
            src.push_str("T=100,D=100,pr=10,[]\n");
        }
        let (specs, errors) = parse_task_set(&src);
        assert_eq!(specs.len(), MAX_TASKSET_SIZE);
        assert!(errors.is_empty());
    }
}
