// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, value_parser};

fn id(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .required(true)
        .value_parser(value_parser!(i64))
        .help(help)
}

fn opt_id(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_parser(value_parser!(i64))
        .help(help)
}

fn req(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).required(true).help(help)
}

fn opt(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help)
}

fn payment_args(cmd: Command) -> Command {
    cmd.arg(id("id", "Record id"))
        .arg(req("amount", "Total payment amount"))
        .arg(opt("principal", "Principal portion (defaults to the remainder)"))
        .arg(opt("interest", "Interest portion (defaults to the remainder)"))
        .arg(req("date", "Payment date YYYY-MM-DD"))
}

pub fn build_cli() -> Command {
    Command::new("ledgerguard")
        .about("Account ledger with budget consistency checks, alerts and financial health")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("user")
                .long("user")
                .global(true)
                .value_parser(value_parser!(i64))
                .help("Act as this user id (defaults to LEDGERGUARD_USER or 1)"),
        )
        .arg(
            Arg::new("as-of")
                .long("as-of")
                .global(true)
                .help("Evaluate date-relative reports as of YYYY-MM-DD"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print JSON"),
        )
        .arg(
            Arg::new("jsonl")
                .long("jsonl")
                .global(true)
                .action(ArgAction::SetTrue)
                .conflicts_with("json")
                .help("Print one JSON object per line"),
        )
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(
            Command::new("account")
                .about("Manage accounts")
                .subcommand(
                    Command::new("add")
                        .arg(req("name", "Account name"))
                        .arg(req("type", "Checking, Savings, Credit Card, Investment, Cash, Other"))
                        .arg(opt("currency", "Three-letter currency code").default_value("USD"))
                        .arg(opt("balance", "Opening balance").default_value("0")),
                )
                .subcommand(
                    Command::new("list").arg(
                        Arg::new("all")
                            .long("all")
                            .action(ArgAction::SetTrue)
                            .help("Include inactive accounts"),
                    ),
                )
                .subcommand(Command::new("show").arg(id("id", "Account id")))
                .subcommand(
                    Command::new("update")
                        .arg(id("id", "Account id"))
                        .arg(opt("name", "New name"))
                        .arg(opt("currency", "New currency code")),
                )
                .subcommand(Command::new("deactivate").arg(id("id", "Account id")))
                .subcommand(Command::new("reactivate").arg(id("id", "Account id")))
                .subcommand(
                    Command::new("adjust")
                        .about("Post a correcting entry so the balance equals a target")
                        .arg(id("id", "Account id"))
                        .arg(req("balance", "Target balance")),
                )
                .subcommand(Command::new("summary"))
                .subcommand(Command::new("types")),
        )
        .subcommand(
            Command::new("category")
                .about("Manage categories")
                .subcommand(
                    Command::new("add")
                        .arg(req("name", "Category name"))
                        .arg(req("type", "Income or Expense")),
                )
                .subcommand(Command::new("list")),
        )
        .subcommand(
            Command::new("tx")
                .about("Record and inspect transactions")
                .subcommand(
                    Command::new("add")
                        .arg(id("account", "Account id"))
                        .arg(req("type", "Income or Expense"))
                        .arg(req("amount", "Positive amount"))
                        .arg(req("date", "YYYY-MM-DD"))
                        .arg(opt_id("category", "Category id"))
                        .arg(opt("description", "Free text"))
                        .arg(opt("merchant", "Merchant or payer"))
                        .arg(
                            Arg::new("recurring")
                                .long("recurring")
                                .action(ArgAction::SetTrue)
                                .help("Mark as a recurring entry"),
                        ),
                )
                .subcommand(
                    Command::new("list")
                        .arg(opt_id("account", "Only this account"))
                        .arg(opt_id("category", "Only this category"))
                        .arg(opt("type", "Income, Expense or Transfer"))
                        .arg(opt("from", "On or after YYYY-MM-DD"))
                        .arg(opt("to", "On or before YYYY-MM-DD"))
                        .arg(
                            Arg::new("recurring")
                                .long("recurring")
                                .action(ArgAction::SetTrue)
                                .help("Only recurring entries"),
                        )
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(usize)),
                        ),
                )
                .subcommand(
                    Command::new("search")
                        .arg(req("keyword", "Matched against description and merchant"))
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(usize)),
                        ),
                )
                .subcommand(Command::new("recent"))
                .subcommand(Command::new("recurring").about("Entries marked recurring"))
                .subcommand(
                    Command::new("summary")
                        .arg(req("from", "YYYY-MM-DD"))
                        .arg(req("to", "YYYY-MM-DD")),
                )
                .subcommand(Command::new("delete").arg(id("id", "Transaction id")))
                .subcommand(
                    Command::new("recategorize")
                        .arg(id("id", "Transaction id"))
                        .arg(opt_id("category", "New category id, omit to clear")),
                )
                .subcommand(
                    Command::new("transfer")
                        .arg(id("from", "Source account id"))
                        .arg(id("to", "Destination account id"))
                        .arg(req("amount", "Positive amount"))
                        .arg(req("date", "YYYY-MM-DD"))
                        .arg(opt("description", "Free text")),
                ),
        )
        .subcommand(
            Command::new("budget")
                .about("Plan spending per category and period")
                .subcommand(
                    Command::new("add")
                        .arg(id("category", "Expense category id"))
                        .arg(req("amount", "Spending limit"))
                        .arg(req("start", "Period start YYYY-MM-DD"))
                        .arg(req("end", "Period end YYYY-MM-DD"))
                        .arg(opt("name", "Defaults to the category name"))
                        .arg(opt("threshold", "Alert threshold percent, default 80")),
                )
                .subcommand(
                    Command::new("update")
                        .arg(id("id", "Budget id"))
                        .arg(opt("name", "New name"))
                        .arg(opt("amount", "New limit"))
                        .arg(opt("start", "New start"))
                        .arg(opt("end", "New end"))
                        .arg(opt("threshold", "New alert threshold")),
                )
                .subcommand(Command::new("deactivate").arg(id("id", "Budget id")))
                .subcommand(
                    Command::new("reactivate")
                        .about("Put an inactive budget back in force if its period is free")
                        .arg(id("id", "Budget id")),
                )
                .subcommand(
                    Command::new("bulk")
                        .about("Update several budgets in one all-or-none step")
                        .arg(
                            Arg::new("row")
                                .long("row")
                                .required(true)
                                .action(ArgAction::Append)
                                .help("ID,AMOUNT,THRESHOLD,ACTIVE with blanks kept, repeatable"),
                        ),
                )
                .subcommand(Command::new("list").arg(opt_id("category", "Only this category")))
                .subcommand(Command::new("current"))
                .subcommand(Command::new("show").arg(id("id", "Budget id")))
                .subcommand(Command::new("performance"))
                .subcommand(
                    Command::new("template")
                        .about("Create one budget per CATEGORY=AMOUNT item for a shared period")
                        .arg(req("start", "Period start YYYY-MM-DD"))
                        .arg(req("end", "Period end YYYY-MM-DD"))
                        .arg(opt("threshold", "Alert threshold percent"))
                        .arg(
                            Arg::new("item")
                                .long("item")
                                .required(true)
                                .action(ArgAction::Append)
                                .help("CATEGORY_ID=AMOUNT, repeatable"),
                        ),
                )
                .subcommand(Command::new("sync").about("Rewrite cached spend from transactions")),
        )
        .subcommand(
            Command::new("loan")
                .about("Money lent to others")
                .subcommand(
                    Command::new("add")
                        .arg(req("name", "Loan name"))
                        .arg(req("borrower", "Who owes the money"))
                        .arg(req("principal", "Amount lent"))
                        .arg(opt("rate", "Interest rate percent").default_value("0"))
                        .arg(req("start", "Start date YYYY-MM-DD"))
                        .arg(opt("due", "Due date YYYY-MM-DD"))
                        .arg(opt_id("account", "Account the money leaves from")),
                )
                .subcommand(payment_args(Command::new("pay")))
                .subcommand(Command::new("list"))
                .subcommand(Command::new("summary"))
                .subcommand(Command::new("alerts")),
        )
        .subcommand(
            Command::new("debt")
                .about("Money owed to creditors")
                .subcommand(
                    Command::new("add")
                        .arg(req("name", "Debt name"))
                        .arg(req("type", "Credit Card, Student Loan, Mortgage, Personal Loan, Auto Loan, Other"))
                        .arg(opt("creditor", "Who is owed"))
                        .arg(req("original", "Amount borrowed"))
                        .arg(opt("balance", "Current balance, defaults to the original amount"))
                        .arg(opt("rate", "Interest rate percent"))
                        .arg(opt("minimum", "Minimum payment"))
                        .arg(opt("next-payment", "Next payment date YYYY-MM-DD"))
                        .arg(opt_id("account", "Account the borrowed money lands in")),
                )
                .subcommand(
                    Command::new("update")
                        .arg(id("id", "Debt id"))
                        .arg(opt("name", "New name"))
                        .arg(opt("type", "New debt type"))
                        .arg(opt("creditor", "New creditor"))
                        .arg(opt("rate", "New interest rate"))
                        .arg(opt("minimum", "New minimum payment"))
                        .arg(opt("next-payment", "New next payment date")),
                )
                .subcommand(payment_args(Command::new("pay")))
                .subcommand(Command::new("deactivate").arg(id("id", "Debt id")))
                .subcommand(Command::new("list"))
                .subcommand(Command::new("summary"))
                .subcommand(
                    Command::new("due").arg(
                        Arg::new("days")
                            .long("days")
                            .value_parser(value_parser!(i64))
                            .default_value("7"),
                    ),
                ),
        )
        .subcommand(
            Command::new("invest")
                .about("Investment holdings")
                .subcommand(
                    Command::new("add")
                        .arg(req("name", "Holding name"))
                        .arg(req("kind", "Stocks, Bonds, Mutual Funds, ETF, Real Estate, Crypto, Other"))
                        .arg(opt("symbol", "Ticker"))
                        .arg(opt("quantity", "Units held"))
                        .arg(opt("price", "Purchase price per unit"))
                        .arg(opt("current-price", "Current price per unit"))
                        .arg(req("invested", "Total amount invested"))
                        .arg(opt("value", "Current market value"))
                        .arg(opt_id("account", "Account gains and losses are booked to")),
                )
                .subcommand(
                    Command::new("revalue")
                        .arg(id("id", "Investment id"))
                        .arg(req("value", "Current market value"))
                        .arg(opt("price", "Current price per unit")),
                )
                .subcommand(Command::new("deactivate").arg(id("id", "Investment id")))
                .subcommand(Command::new("list"))
                .subcommand(Command::new("summary")),
        )
        .subcommand(
            Command::new("report")
                .about("Derived views over balances and budgets")
                .subcommand(Command::new("overview"))
                .subcommand(Command::new("alerts"))
                .subcommand(
                    Command::new("feasibility")
                        .arg(id("category", "Expense category id"))
                        .arg(req("amount", "Proposed limit"))
                        .arg(req("start", "Period start YYYY-MM-DD"))
                        .arg(req("end", "Period end YYYY-MM-DD")),
                ),
        )
        .subcommand(
            Command::new("import").about("Bulk import").subcommand(
                Command::new("transactions")
                    .arg(req("path", "CSV with date,account,type,amount,category,description,merchant")),
            ),
        )
        .subcommand(Command::new("doctor").about("Check ledger and cache consistency"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_reach_leaf_commands() {
        let m = build_cli().get_matches_from([
            "ledgerguard", "budget", "current", "--user", "9", "--json",
        ]);
        let (_, budget) = m.subcommand().unwrap();
        let (_, current) = budget.subcommand().unwrap();
        assert_eq!(current.get_one::<i64>("user"), Some(&9));
        assert!(current.get_flag("json"));
    }

    #[test]
    fn template_items_repeat() {
        let m = build_cli().get_matches_from([
            "ledgerguard", "budget", "template", "--start", "2025-01-01", "--end",
            "2025-02-01", "--item", "1=100", "--item", "2=50",
        ]);
        let (_, budget) = m.subcommand().unwrap();
        let (_, t) = budget.subcommand().unwrap();
        let items: Vec<&String> = t.get_many::<String>("item").unwrap().collect();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }
}
