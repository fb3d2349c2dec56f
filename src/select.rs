use crate::cv::device::Resolution;
use crate::interrupt::Interrupt;
use anyhow::{Result, anyhow};
use log::{debug, info};
use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Chosen(Resolution),
    /// The user closed the input (Ctrl-D) or interrupted the prompt.
    Cancelled,
}

/// Lets the user pick one of `candidates` from a numbered menu.
///
/// A single candidate is returned without asking. Otherwise an empty answer
/// picks the first (default) entry, `1..=n` picks that entry, and anything
/// else asks again. End of input, an `Interrupted` read or a raised
/// `interrupt` cancels.
pub fn select<I: BufRead, W: Write>(
    candidates: &[Resolution],
    input: &mut I,
    out: &mut W,
    interrupt: &Interrupt,
) -> Result<Selection> {
    let Some(&default) = candidates.first() else {
        return Err(anyhow!("No camera resolution to choose from"));
    };

    if interrupt.is_set() {
        return Ok(cancelled(out));
    }

    if candidates.len() == 1 {
        info!("Using the only resolution available: {}", default);
        return Ok(Selection::Chosen(default));
    }

    write_menu(candidates, out)?;

    let mut answer = String::new();
    loop {
        write!(
            out,
            "Enter a number (1-{}) [default=1]: ",
            candidates.len()
        )?;
        out.flush()?;

        answer.clear();
        match read_answer(input, &mut answer) {
            Ok(true) if !interrupt.is_set() => {}
            Ok(_) => return Ok(cancelled(out)),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(cancelled(out)),
            Err(e) => return Err(e.into()),
        }

        match parse_choice(answer.trim(), candidates.len()) {
            Choice::Default => return Ok(Selection::Chosen(default)),
            Choice::Index(i) => return Ok(Selection::Chosen(candidates[i])),
            Choice::OutOfRange => writeln!(
                out,
                "Invalid choice. Enter a number between 1 and {}.",
                candidates.len()
            )?,
            Choice::NotANumber => writeln!(out, "Invalid input. Enter a number only.")?,
        }
        debug!("Rejected resolution answer {:?}", answer.trim());
    }
}

/// Reads one line into `answer`, `Ok(false)` at end of input. Unlike
/// `read_line`, an `Interrupted` error is returned instead of retried.
fn read_answer<I: BufRead>(input: &mut I, answer: &mut String) -> io::Result<bool> {
    let mut bytes = Vec::new();
    loop {
        let available = input.fill_buf()?;
        if available.is_empty() {
            break;
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(end) => {
                bytes.extend_from_slice(&available[..=end]);
                input.consume(end + 1);
                break;
            }
            None => {
                let n = available.len();
                bytes.extend_from_slice(available);
                input.consume(n);
            }
        }
    }

    if bytes.is_empty() {
        return Ok(false);
    }
    answer.push_str(&String::from_utf8_lossy(&bytes));
    Ok(true)
}

fn write_menu<W: Write>(candidates: &[Resolution], out: &mut W) -> io::Result<()> {
    let rule = "=".repeat(40);
    writeln!(out)?;
    writeln!(out, "{rule}")?;
    writeln!(out, "--- Choose the webcam resolution ---")?;
    for (i, resolution) in candidates.iter().enumerate() {
        let marker = if i == 0 { " (Default)" } else { "" };
        writeln!(out, "  [{}] {}{}", i + 1, resolution, marker)?;
    }
    writeln!(out, "{rule}")
}

fn cancelled<W: Write>(out: &mut W) -> Selection {
    let _ = writeln!(out, "\nExiting.");
    info!("Resolution selection cancelled");
    Selection::Cancelled
}

#[derive(Debug, PartialEq, Eq)]
enum Choice {
    Default,
    Index(usize),
    OutOfRange,
    NotANumber,
}

fn parse_choice(answer: &str, count: usize) -> Choice {
    if answer.is_empty() {
        return Choice::Default;
    }
    match answer.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Choice::Index(n - 1),
        Ok(_) => Choice::OutOfRange,
        Err(_) if answer.parse::<i64>().is_ok() => Choice::OutOfRange,
        Err(_) => Choice::NotANumber,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn candidates() -> Vec<Resolution> {
        vec![
            Resolution::new(640, 480),
            Resolution::new(1280, 720),
            Resolution::new(1920, 1080),
        ]
    }

    fn run(answers: &str) -> (Selection, String) {
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut out = Vec::new();
        let selection = select(&candidates(), &mut input, &mut out, &Interrupt::default()).unwrap();
        (selection, String::from_utf8(out).unwrap())
    }

    #[test]
    fn single_candidate_skips_the_prompt() {
        let mut input = Cursor::new(Vec::new());
        let mut out = Vec::new();
        let selection = select(
            &[Resolution::new(640, 480)],
            &mut input,
            &mut out,
            &Interrupt::default(),
        )
        .unwrap();

        assert_eq!(selection, Selection::Chosen(Resolution::new(640, 480)));
        assert!(out.is_empty());
    }

    #[test]
    fn menu_marks_the_default() {
        let (_, shown) = run("\n");
        assert!(shown.contains("  [1] 640x480 (Default)"));
        assert!(shown.contains("  [3] 1920x1080\n"));
    }

    #[test]
    fn empty_answer_means_default() {
        assert_eq!(run("\n").0, Selection::Chosen(Resolution::new(640, 480)));
    }

    #[test]
    fn numbers_are_one_based() {
        assert_eq!(run("2\n").0, Selection::Chosen(Resolution::new(1280, 720)));
        assert_eq!(run(" 3 \n").0, Selection::Chosen(Resolution::new(1920, 1080)));
    }

    #[test]
    fn bad_answers_prompt_again() {
        let (selection, shown) = run("abc\n0\n-2\n4\n3\n");
        assert_eq!(selection, Selection::Chosen(Resolution::new(1920, 1080)));
        assert_eq!(shown.matches("Invalid input").count(), 1);
        assert_eq!(shown.matches("Invalid choice").count(), 3);
        assert_eq!(shown.matches("Enter a number (1-3)").count(), 5);
    }

    #[test]
    fn end_of_input_cancels() {
        assert_eq!(run("").0, Selection::Cancelled);
        assert_eq!(run("9\n").0, Selection::Cancelled);
    }

    /// Fails its first read with `Interrupted`, then has an answer ready.
    struct InterruptedOnce {
        inner: Cursor<Vec<u8>>,
        interrupted: bool,
    }

    impl io::Read for InterruptedOnce {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            io::Read::read(&mut self.inner, buf)
        }
    }

    impl BufRead for InterruptedOnce {
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::ErrorKind::Interrupted.into());
            }
            self.inner.fill_buf()
        }

        fn consume(&mut self, amt: usize) {
            self.inner.consume(amt)
        }
    }

    #[test]
    fn interrupted_read_cancels() {
        let mut input = InterruptedOnce {
            inner: Cursor::new(b"2\n".to_vec()),
            interrupted: false,
        };
        let mut out = Vec::new();
        let selection = select(&candidates(), &mut input, &mut out, &Interrupt::default()).unwrap();

        assert_eq!(selection, Selection::Cancelled);
        assert!(String::from_utf8(out).unwrap().ends_with("Exiting.\n"));
    }

    #[test]
    fn raised_interrupt_cancels() {
        let interrupt = Interrupt::default();
        interrupt.trigger();
        let mut input = Cursor::new(b"2\n".to_vec());
        let mut out = Vec::new();

        let selection = select(&candidates(), &mut input, &mut out, &interrupt).unwrap();
        assert_eq!(selection, Selection::Cancelled);
        assert_eq!(input.position(), 0);
    }

    #[test]
    fn partial_last_line_is_still_an_answer() {
        assert_eq!(run("3").0, Selection::Chosen(Resolution::new(1920, 1080)));
    }

    #[test]
    fn no_candidates_is_an_error() {
        let mut input = Cursor::new(Vec::new());
        let mut out = Vec::new();
        assert!(select(&[], &mut input, &mut out, &Interrupt::default()).is_err());
    }

    #[test]
    fn choice_parsing() {
        assert_eq!(parse_choice("", 2), Choice::Default);
        assert_eq!(parse_choice("1", 2), Choice::Index(0));
        assert_eq!(parse_choice("3", 2), Choice::OutOfRange);
        assert_eq!(parse_choice("x1", 2), Choice::NotANumber);
    }
}
