//! Scenario-file parsing: `spec.md` §6's line-oriented command grammar,
//! parsed up front into a `Vec<ScenarioCommand>` rather than streamed, so a
//! malformed line aborts before any process traffic is generated.
use libfed_base::{err, Result};
use libfed_proto::{BookId, BorrowerId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenarioCommand {
    Connect { c1: BorrowerId, c2: BorrowerId },
    StartLeLibr,
    StartLeLoaners,
    TakeBook { c: BorrowerId, b: BookId },
    DonateBook { c: BorrowerId, b: BookId, n: u32 },
    GetMostPopularBook,
    CheckNumBooksLoaned,
    Shutdown,
}

/// Parses the full scenario text. Blank lines and `#`-prefixed comments are
/// skipped; everything else must match one of `spec.md` §6's recognized
/// commands, or parsing fails with the offending line number.
pub fn parse_scenario(text: &str) -> Result<Vec<ScenarioCommand>> {
    let mut commands = Vec::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        commands.push(parse_line(line).map_err(|e| err(format!("scenario line {line_no}: {e}")))?);
    }
    Ok(commands)
}

fn parse_line(line: &str) -> Result<ScenarioCommand> {
    let mut tokens = line.split_whitespace();
    let opcode = tokens.next().ok_or_else(|| err("empty command"))?;
    match opcode {
        "CONNECT" => {
            let c1 = next_borrower(&mut tokens)?;
            let c2 = next_borrower(&mut tokens)?;
            expect_exhausted(tokens, "CONNECT")?;
            Ok(ScenarioCommand::Connect { c1, c2 })
        }
        "START_LE_LIBR" => {
            expect_exhausted(tokens, "START_LE_LIBR")?;
            Ok(ScenarioCommand::StartLeLibr)
        }
        "START_LE_LOANERS" => {
            expect_exhausted(tokens, "START_LE_LOANERS")?;
            Ok(ScenarioCommand::StartLeLoaners)
        }
        "TAKE_BOOK" => {
            let c = next_borrower(&mut tokens)?;
            let b = next_book(&mut tokens)?;
            expect_exhausted(tokens, "TAKE_BOOK")?;
            Ok(ScenarioCommand::TakeBook { c, b })
        }
        "DONATE_BOOK" => {
            let c = next_borrower(&mut tokens)?;
            let b = next_book(&mut tokens)?;
            let n = next_u32(&mut tokens, "copy count")?;
            expect_exhausted(tokens, "DONATE_BOOK")?;
            Ok(ScenarioCommand::DonateBook { c, b, n })
        }
        "GET_MOST_POPULAR_BOOK" => {
            expect_exhausted(tokens, "GET_MOST_POPULAR_BOOK")?;
            Ok(ScenarioCommand::GetMostPopularBook)
        }
        "CHECK_NUM_BOOKS_LOANED" => {
            expect_exhausted(tokens, "CHECK_NUM_BOOKS_LOANED")?;
            Ok(ScenarioCommand::CheckNumBooksLoaned)
        }
        "SHUTDOWN" => {
            expect_exhausted(tokens, "SHUTDOWN")?;
            Ok(ScenarioCommand::Shutdown)
        }
        other => Err(err(format!("unrecognized opcode {other:?}"))),
    }
}

fn next_u32<'a>(tokens: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<u32> {
    let tok = tokens.next().ok_or_else(|| err(format!("missing {what}")))?;
    tok.parse::<u32>().map_err(|e| err(format!("{what} {tok:?} is not a valid integer: {e}")))
}

fn next_borrower<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<BorrowerId> {
    next_u32(tokens, "borrower id").map(BorrowerId::new)
}

fn next_book<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<BookId> {
    next_u32(tokens, "book id").map(BookId)
}

fn expect_exhausted<'a>(mut tokens: impl Iterator<Item = &'a str>, opcode: &str) -> Result<()> {
    match tokens.next() {
        None => Ok(()),
        Some(extra) => Err(err(format!("{opcode} has unexpected trailing token {extra:?}"))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn parses_the_n2_walkthrough() {
        let text = "\
            CONNECT 0 1\n\
            CONNECT 1 2\n\
            CONNECT 2 3\n\
            START_LE_LIBR\n\
            START_LE_LOANERS\n\
            TAKE_BOOK 0 0\n\
            DONATE_BOOK 0 0 4\n\
            CHECK_NUM_BOOKS_LOANED\n\
            SHUTDOWN\n";
        let commands = parse_scenario(text).unwrap();
        assert_eq!(commands.len(), 9);
        assert_eq!(commands[0], ScenarioCommand::Connect { c1: BorrowerId::new(0), c2: BorrowerId::new(1) });
        assert_eq!(commands[5], ScenarioCommand::TakeBook { c: BorrowerId::new(0), b: BookId(0) });
        assert_eq!(*commands.last().unwrap(), ScenarioCommand::Shutdown);
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        let text = "# a comment\n\nSTART_LE_LIBR\n";
        let commands = parse_scenario(text).unwrap();
        assert_eq!(commands, vec![ScenarioCommand::StartLeLibr]);
    }

    #[test]
    fn rejects_unknown_opcode() {
        assert!(parse_scenario("FROB 1 2\n").is_err());
    }

    #[test]
    fn rejects_malformed_integer() {
        assert!(parse_scenario("TAKE_BOOK x 0\n").is_err());
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(parse_scenario("SHUTDOWN now\n").is_err());
    }
}
