//! Interactive menu loop.
//!
//! Reads one answer per line and prints results; every operation goes
//! through `RosterService`. Persistence errors are reported and the loop
//! continues. End of input exits cleanly.

use roster_core::{
    Account, AccountDetails, Address, Entity, Post, Profile, Role, RosterService, SessionResult,
};
use std::io::{self, BufRead, Write};

enum Flow {
    Continue,
    Back,
    Exit,
}

pub struct Shell<'conn, R, W> {
    service: RosterService<'conn>,
    input: R,
    output: W,
}

impl<'conn, R: BufRead, W: Write> Shell<'conn, R, W> {
    pub fn new(service: RosterService<'conn>, input: R, output: W) -> Self {
        Self {
            service,
            input,
            output,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        writeln!(self.output, "=== Roster ===")?;
        loop {
            writeln!(self.output)?;
            writeln!(self.output, "Main Menu:")?;
            writeln!(self.output, "1. Account Management")?;
            writeln!(self.output, "2. Post Management")?;
            writeln!(self.output, "3. Role Management")?;
            writeln!(self.output, "4. Exit")?;
            let flow = match self.prompt("Enter your choice: ")?.as_deref() {
                None | Some("4") => Flow::Exit,
                Some("1") => self.submenu(Self::account_menu)?,
                Some("2") => self.submenu(Self::post_menu)?,
                Some("3") => self.submenu(Self::role_menu)?,
                Some(_) => {
                    writeln!(self.output, "Invalid choice. Please try again.")?;
                    Flow::Continue
                }
            };
            if matches!(flow, Flow::Exit) {
                writeln!(self.output, "Exiting...")?;
                self.output.flush()?;
                return Ok(());
            }
        }
    }

    fn submenu(&mut self, menu: fn(&mut Self) -> io::Result<Flow>) -> io::Result<Flow> {
        loop {
            match menu(self)? {
                Flow::Continue => {}
                Flow::Back => return Ok(Flow::Continue),
                Flow::Exit => return Ok(Flow::Exit),
            }
        }
    }

    fn account_menu(&mut self) -> io::Result<Flow> {
        self.print_menu(
            "Account Management:",
            &[
                "Create Account",
                "Create Account With Profile",
                "Read Account",
                "Find Account By Username",
                "Account Details",
                "Update Email",
                "Set Address",
                "Delete Account",
                "List All Accounts",
                "Back to Main Menu",
            ],
        )?;
        let Some(choice) = self.prompt("Enter your choice: ")? else {
            return Ok(Flow::Exit);
        };
        match choice.as_str() {
            "1" => {
                let Some((username, email)) = self.read_pair("Enter username: ", "Enter email: ")?
                else {
                    return Ok(Flow::Exit);
                };
                let created = self.service.create_account(username, email);
                self.report(created, |out, account| {
                    writeln!(out, "Created: {}", account_line(account))
                })?;
            }
            "2" => {
                let Some((username, email)) = self.read_pair("Enter username: ", "Enter email: ")?
                else {
                    return Ok(Flow::Exit);
                };
                let Some(fields) = self.read_fields(&[
                    "Enter first name: ",
                    "Enter last name: ",
                    "Enter phone number: ",
                    "Enter bio: ",
                ])?
                else {
                    return Ok(Flow::Exit);
                };
                let [first, last, phone, bio]: [String; 4] = match fields.try_into() {
                    Ok(fields) => fields,
                    Err(_) => return Ok(Flow::Continue),
                };
                let profile = Profile::new(first, last, phone, bio);
                let created = self
                    .service
                    .create_account_with_profile(username, email, profile);
                self.report(created, |out, account| {
                    writeln!(out, "Created: {}", account_line(account))
                })?;
            }
            "3" => {
                let Some(id) = self.read_id("Enter account ID: ")? else {
                    return Ok(Flow::Continue);
                };
                let found = self.service.find_account(id);
                self.report_found(found, "Account", account_line)?;
            }
            "4" => {
                let Some(username) = self.prompt("Enter username: ")? else {
                    return Ok(Flow::Exit);
                };
                let found = self.service.find_account_by_username(&username);
                self.report_found(found, "Account", account_line)?;
            }
            "5" => {
                let Some(id) = self.read_id("Enter account ID: ")? else {
                    return Ok(Flow::Continue);
                };
                let details = self.service.account_details(id);
                self.report(details, |out, details| match details {
                    Some(details) => write_details(out, details),
                    None => writeln!(out, "Account not found"),
                })?;
            }
            "6" => {
                let Some(id) = self.read_id("Enter account ID: ")? else {
                    return Ok(Flow::Continue);
                };
                let Some(email) = self.prompt("Enter new email: ")? else {
                    return Ok(Flow::Exit);
                };
                let updated = self.service.update_account_email(id, email);
                self.report_updated(updated, "Account")?;
            }
            "7" => {
                let Some(id) = self.read_id("Enter account ID: ")? else {
                    return Ok(Flow::Continue);
                };
                let Some(fields) = self.read_fields(&[
                    "Enter street: ",
                    "Enter city: ",
                    "Enter state: ",
                    "Enter zip code: ",
                ])?
                else {
                    return Ok(Flow::Exit);
                };
                let [street, city, state, zip]: [String; 4] = match fields.try_into() {
                    Ok(fields) => fields,
                    Err(_) => return Ok(Flow::Continue),
                };
                let updated = self
                    .service
                    .add_address(id, Address::new(street, city, state, zip));
                self.report_updated(updated, "Account")?;
            }
            "8" => {
                let Some(id) = self.read_id("Enter account ID: ")? else {
                    return Ok(Flow::Continue);
                };
                let deleted = self.service.delete_account(id);
                self.report_deleted(deleted, "Account")?;
            }
            "9" => {
                let listed = self.service.list_accounts();
                self.report(listed, |out, accounts| {
                    writeln!(out, "All Accounts:")?;
                    for account in accounts {
                        writeln!(out, "  {}", account_line(account))?;
                    }
                    Ok(())
                })?;
            }
            "10" => return Ok(Flow::Back),
            _ => writeln!(self.output, "Invalid choice. Please try again.")?,
        }
        Ok(Flow::Continue)
    }

    fn post_menu(&mut self) -> io::Result<Flow> {
        self.print_menu(
            "Post Management:",
            &[
                "Create Post",
                "Read Post",
                "Posts By Account",
                "Update Post",
                "Record View",
                "Delete Post",
                "List All Posts",
                "Back to Main Menu",
            ],
        )?;
        let Some(choice) = self.prompt("Enter your choice: ")? else {
            return Ok(Flow::Exit);
        };
        match choice.as_str() {
            "1" => {
                let Some(author_id) = self.read_id("Enter author account ID: ")? else {
                    return Ok(Flow::Continue);
                };
                let Some((title, content)) = self.read_pair("Enter title: ", "Enter content: ")?
                else {
                    return Ok(Flow::Exit);
                };
                let created = self.service.create_post(author_id, title, content);
                self.report(created, |out, post| writeln!(out, "Created: {}", post_line(post)))?;
            }
            "2" => {
                let Some(id) = self.read_id("Enter post ID: ")? else {
                    return Ok(Flow::Continue);
                };
                let found = self.service.find_post(id);
                self.report_found(found, "Post", post_line)?;
            }
            "3" => {
                let Some(author_id) = self.read_id("Enter account ID: ")? else {
                    return Ok(Flow::Continue);
                };
                let posts = self.service.posts_by_account(author_id);
                self.report(posts, |out, posts| {
                    if posts.is_empty() {
                        return writeln!(out, "No posts found");
                    }
                    writeln!(out, "Posts:")?;
                    for post in posts {
                        writeln!(out, "  {}", post_line(post))?;
                    }
                    Ok(())
                })?;
            }
            "4" => {
                let Some(id) = self.read_id("Enter post ID: ")? else {
                    return Ok(Flow::Continue);
                };
                let Some((title, content)) =
                    self.read_pair("Enter new title: ", "Enter new content: ")?
                else {
                    return Ok(Flow::Exit);
                };
                let updated = self.service.update_post(id, title, content);
                self.report_updated(updated, "Post")?;
            }
            "5" => {
                let Some(id) = self.read_id("Enter post ID: ")? else {
                    return Ok(Flow::Continue);
                };
                let viewed = self.service.record_post_view(id);
                self.report(viewed, |out, views| match views {
                    Some(views) => writeln!(out, "Post views: {views}"),
                    None => writeln!(out, "Post not found"),
                })?;
            }
            "6" => {
                let Some(id) = self.read_id("Enter post ID: ")? else {
                    return Ok(Flow::Continue);
                };
                let deleted = self.service.delete_post(id);
                self.report_deleted(deleted, "Post")?;
            }
            "7" => {
                let listed = self.service.list_posts();
                self.report(listed, |out, posts| {
                    writeln!(out, "All Posts:")?;
                    for post in posts {
                        writeln!(out, "  {}", post_line(post))?;
                    }
                    Ok(())
                })?;
            }
            "8" => return Ok(Flow::Back),
            _ => writeln!(self.output, "Invalid choice. Please try again.")?,
        }
        Ok(Flow::Continue)
    }

    fn role_menu(&mut self) -> io::Result<Flow> {
        self.print_menu(
            "Role Management:",
            &[
                "Create Role",
                "Read Role",
                "Update Role",
                "Delete Role",
                "List All Roles",
                "Assign Role To Account",
                "Revoke Role From Account",
                "Back to Main Menu",
            ],
        )?;
        let Some(choice) = self.prompt("Enter your choice: ")? else {
            return Ok(Flow::Exit);
        };
        match choice.as_str() {
            "1" => {
                let Some((name, description)) =
                    self.read_pair("Enter role name: ", "Enter description: ")?
                else {
                    return Ok(Flow::Exit);
                };
                let created = self.service.create_role(name, description);
                self.report(created, |out, role| writeln!(out, "Created: {}", role_line(role)))?;
            }
            "2" => {
                let Some(id) = self.read_id("Enter role ID: ")? else {
                    return Ok(Flow::Continue);
                };
                let found = self.service.find_role(id);
                self.report_found(found, "Role", role_line)?;
            }
            "3" => {
                let Some(id) = self.read_id("Enter role ID: ")? else {
                    return Ok(Flow::Continue);
                };
                let Some((name, description)) =
                    self.read_pair("Enter new name: ", "Enter new description: ")?
                else {
                    return Ok(Flow::Exit);
                };
                let updated = self.service.update_role(id, name, description);
                self.report_updated(updated, "Role")?;
            }
            "4" => {
                let Some(id) = self.read_id("Enter role ID: ")? else {
                    return Ok(Flow::Continue);
                };
                let deleted = self.service.delete_role(id);
                self.report_deleted(deleted, "Role")?;
            }
            "5" => {
                let listed = self.service.list_roles();
                self.report(listed, |out, roles| {
                    writeln!(out, "All Roles:")?;
                    for role in roles {
                        writeln!(out, "  {}", role_line(role))?;
                    }
                    Ok(())
                })?;
            }
            "6" | "7" => {
                let Some(account_id) = self.read_id("Enter account ID: ")? else {
                    return Ok(Flow::Continue);
                };
                let Some(role_id) = self.read_id("Enter role ID: ")? else {
                    return Ok(Flow::Continue);
                };
                if choice == "6" {
                    let assigned = self.service.assign_role(account_id, role_id);
                    self.report(assigned, |out, changed| {
                        writeln!(out, "{}", if *changed { "Role assigned" } else { "Role already assigned" })
                    })?;
                } else {
                    let revoked = self.service.revoke_role(account_id, role_id);
                    self.report(revoked, |out, changed| {
                        writeln!(out, "{}", if *changed { "Role revoked" } else { "Role was not assigned" })
                    })?;
                }
            }
            "8" => return Ok(Flow::Back),
            _ => writeln!(self.output, "Invalid choice. Please try again.")?,
        }
        Ok(Flow::Continue)
    }

    fn print_menu(&mut self, title: &str, items: &[&str]) -> io::Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "{title}")?;
        for (index, item) in items.iter().enumerate() {
            writeln!(self.output, "{}. {item}", index + 1)?;
        }
        Ok(())
    }

    /// Prints `label`, then reads one trimmed line; `None` at end of input.
    fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Reads a numeric id; prints a notice and returns `None` otherwise.
    fn read_id(&mut self, label: &str) -> io::Result<Option<i64>> {
        let Some(raw) = self.prompt(label)? else {
            return Ok(None);
        };
        match raw.parse::<i64>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                writeln!(self.output, "Invalid number: `{raw}`")?;
                Ok(None)
            }
        }
    }

    fn read_pair(&mut self, first: &str, second: &str) -> io::Result<Option<(String, String)>> {
        let Some(a) = self.prompt(first)? else {
            return Ok(None);
        };
        let Some(b) = self.prompt(second)? else {
            return Ok(None);
        };
        Ok(Some((a, b)))
    }

    fn read_fields(&mut self, labels: &[&str]) -> io::Result<Option<Vec<String>>> {
        let mut values = Vec::with_capacity(labels.len());
        for label in labels {
            match self.prompt(label)? {
                Some(value) => values.push(value),
                None => return Ok(None),
            }
        }
        Ok(Some(values))
    }

    fn report<T>(
        &mut self,
        result: SessionResult<T>,
        print: impl FnOnce(&mut W, &T) -> io::Result<()>,
    ) -> io::Result<()> {
        match result {
            Ok(value) => print(&mut self.output, &value),
            Err(err) => writeln!(self.output, "Error ({}): {err}", err.kind().as_str()),
        }
    }

    fn report_found<T>(
        &mut self,
        result: SessionResult<Option<T>>,
        label: &str,
        line: fn(&T) -> String,
    ) -> io::Result<()> {
        self.report(result, |out, found| match found {
            Some(value) => writeln!(out, "Found: {}", line(value)),
            None => writeln!(out, "{label} not found"),
        })
    }

    fn report_updated<T>(&mut self, result: SessionResult<Option<T>>, label: &str) -> io::Result<()> {
        self.report(result, |out, updated| match updated {
            Some(_) => writeln!(out, "{label} updated"),
            None => writeln!(out, "{label} not found"),
        })
    }

    fn report_deleted(&mut self, result: SessionResult<bool>, label: &str) -> io::Result<()> {
        self.report(result, |out, deleted| {
            if *deleted {
                writeln!(out, "{label} deleted")
            } else {
                writeln!(out, "{label} not found")
            }
        })
    }
}

fn account_line(account: &Account) -> String {
    let mut line = format!(
        "Account{{id={}, username='{}', email='{}'",
        account.id().unwrap_or_default(),
        account.username,
        account.email
    );
    if let Some(address) = &account.address {
        line.push_str(&format!(
            ", address='{}, {}, {} {}'",
            address.street, address.city, address.state, address.zip
        ));
    }
    line.push('}');
    line
}

fn post_line(post: &Post) -> String {
    format!(
        "Post{{id={}, title='{}', author={}, views={}, created_at={}}}",
        post.id().unwrap_or_default(),
        post.title,
        post.author_id().unwrap_or_default(),
        post.view_count,
        post.created_at
    )
}

fn role_line(role: &Role) -> String {
    format!(
        "Role{{id={}, name='{}', description='{}', accounts={}}}",
        role.id().unwrap_or_default(),
        role.name,
        role.description,
        role.account_ids().len()
    )
}

fn write_details(out: &mut impl Write, details: &AccountDetails) -> io::Result<()> {
    writeln!(out, "Account: {}", account_line(&details.account))?;
    match &details.profile {
        Some(profile) => writeln!(
            out,
            "Profile: {} ({}) {}",
            profile.full_name(),
            profile.phone_number,
            profile.bio
        )?,
        None => writeln!(out, "Profile: none")?,
    }
    let roles: Vec<&str> = details.roles.iter().map(|role| role.name.as_str()).collect();
    writeln!(out, "Roles: [{}]", roles.join(", "))?;
    writeln!(out, "Posts: {}", details.post_count)
}

#[cfg(test)]
mod tests {
    use super::Shell;
    use roster_core::{open_db_in_memory, RosterService};
    use std::io::Cursor;

    fn run_script(script: &str) -> String {
        let mut conn = open_db_in_memory().unwrap();
        let mut output = Vec::new();
        Shell::new(
            RosterService::new(&mut conn),
            Cursor::new(script.as_bytes()),
            &mut output,
        )
        .run()
        .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn create_and_read_account_through_menus() {
        let output = run_script("1\n1\nalice\nalice@example.com\n3\n1\n10\n4\n");
        assert!(output.contains("Created: Account{id=1, username='alice', email='alice@example.com'}"));
        assert!(output.contains("Found: Account{id=1"));
        assert!(output.trim_end().ends_with("Exiting..."));
    }

    #[test]
    fn post_for_missing_author_reports_dangling_reference() {
        let output = run_script("2\n1\n99\nhello\nworld\n8\n4\n");
        assert!(output.contains("Error (dangling_reference)"));
    }

    #[test]
    fn invalid_input_keeps_the_loop_alive() {
        let output = run_script("9\n1\n3\nabc\n10\n4\n");
        assert!(output.contains("Invalid choice. Please try again."));
        assert!(output.contains("Invalid number: `abc`"));
        assert!(output.contains("Exiting..."));
    }

    #[test]
    fn end_of_input_exits() {
        let output = run_script("1\n");
        assert!(output.trim_end().ends_with("Exiting..."));
    }

    #[test]
    fn deleting_an_account_removes_its_posts() {
        let script = "1\n1\nalice\na@x.io\n10\n2\n1\n1\nhi\nthere\n8\n1\n8\n1\n10\n2\n2\n1\n8\n4\n";
        let output = run_script(script);
        assert!(output.contains("Account deleted"));
        assert!(output.contains("Post not found"));
    }
}
