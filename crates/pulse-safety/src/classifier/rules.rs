//! Per-binary rules for a single simple command.

use std::iter::Peekable;
use std::str::Chars;
use std::sync::LazyLock;

use pulse_core::shell_escape;
use regex::Regex;

use super::tokenize::{Redirect, Segment};
use super::{BlockCategory, CommandIntent, classify};

/// Verdict for one segment.
#[derive(Debug, Clone)]
pub(crate) struct Verdict {
    pub(crate) intent: CommandIntent,
    pub(crate) reason: String,
    pub(crate) category: Option<BlockCategory>,
    /// Replacement text for this segment only.
    pub(crate) rewrite: Option<String>,
}

impl Verdict {
    fn certain(bin: &str) -> Self {
        Self {
            intent: CommandIntent::ReadOnlyCertain,
            reason: format!("'{bin}' is read-only"),
            category: None,
            rewrite: None,
        }
    }

    fn conditional(reason: impl Into<String>) -> Self {
        Self {
            intent: CommandIntent::ReadOnlyConditional,
            reason: reason.into(),
            category: None,
            rewrite: None,
        }
    }

    fn write_verb(reason: impl Into<String>) -> Self {
        Self::write(reason, Some(BlockCategory::WriteVerb))
    }

    fn write(reason: impl Into<String>, category: Option<BlockCategory>) -> Self {
        Self {
            intent: CommandIntent::WriteOrUnknown,
            reason: reason.into(),
            category,
            rewrite: None,
        }
    }

    fn rewrite(mut self, rewrite: String) -> Self {
        self.rewrite = Some(rewrite);
        self
    }

    fn rewrite_words(self, words: &[String]) -> Self {
        let joined = join_words(words);
        self.rewrite(joined)
    }

    fn is_write(&self) -> bool {
        self.intent == CommandIntent::WriteOrUnknown
    }
}

/// Always-read-only binaries. Arguments are not inspected.
const READ_ONLY: &[&str] = &[
    "cat", "ls", "head", "wc", "stat", "file", "du", "df", "uptime", "free", "id", "whoami",
    "groups", "uname", "arch", "hostid", "echo", "printf", "ps", "pstree", "pgrep", "pidof",
    "grep", "egrep", "fgrep", "zgrep", "zcat", "bzcat", "xzcat", "tr", "cut", "tac", "nl", "rev",
    "column", "fold", "paste", "join", "comm", "cmp", "diff", "expand", "unexpand", "basename",
    "dirname", "realpath", "readlink", "pwd", "which", "whereis", "printenv", "locale", "nproc",
    "lscpu", "lsmem", "lsblk", "lspci", "lsusb", "lsmod", "lsof", "lsattr", "getfacl", "namei",
    "blkid", "findmnt", "ss", "netstat", "dig", "nslookup", "host", "getent", "last", "lastlog",
    "w", "who", "users", "sha256sum", "sha1sum", "sha512sum", "sha224sum", "sha384sum", "md5sum",
    "shasum", "b2sum", "cksum", "sum", "base64", "base32", "xxd", "hexdump", "od", "strings",
    "jq", "numfmt", "seq", "sleep", "true", "false", "test", "[", "expr", "tree", "cal",
    "getconf", "traceroute", "tracepath", "dmidecode", "lshw", "sensors", "iptables-save",
    "ip6tables-save", "pveversion", "pveperf", "lvs", "vgs", "pvs", "lvdisplay", "vgdisplay",
    "pvdisplay", "lxc-ls", "lxc-info", "modinfo", "dpkg-query", "apt-cache", "tput", "nstat",
];

/// Binaries that change state whatever their arguments.
const WRITE_VERBS: &[&str] = &[
    "rm", "rmdir", "mv", "cp", "dd", "mkdir", "touch", "chmod", "chown", "chgrp", "chattr",
    "setfacl", "ln", "truncate", "shred", "unlink", "install", "patch", "kill", "pkill",
    "killall", "reboot", "shutdown", "poweroff", "halt", "init", "telinit", "aptitude", "yum",
    "dnf", "zypper", "pacman", "apk", "snap", "flatpak", "pip", "pip3", "npm", "gem", "cargo",
    "useradd", "userdel", "usermod", "groupadd", "groupdel", "passwd", "chpasswd", "umount",
    "swapoff", "swapon", "fdisk", "sfdisk", "gdisk", "parted", "wipefs", "mkswap", "losetup",
    "cryptsetup", "lvcreate", "lvremove", "lvextend", "lvresize", "vgcreate", "vgremove",
    "pvcreate", "modprobe", "rmmod", "insmod", "tee", "rsync", "scp", "sftp", "ssh", "nc",
    "ncat", "socat", "at", "batch",
];

static SQL_WRITE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(insert|update|delete|drop|alter|create|truncate|replace|grant|revoke|merge|call|load|attach|detach|pragma|vacuum|into|set|copy|lock|rename|exec|execute|reindex)\b",
    )
    .expect("invalid regex")
});

static AWK_UNSAFE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bsystem\s*\(|\bgetline\b|\|&|\bprintf?\b[^;}]*(?:>|\|)|\bclose\s*\(")
        .expect("invalid regex")
});

/// Classify one segment, including its redirections.
pub(crate) fn classify_segment(seg: &Segment) -> Verdict {
    if let Some(r) = seg.redirects.iter().find(|r| !r.is_harmless()) {
        return Verdict::write(
            format!("output redirection to '{}' writes a file", r.target),
            Some(BlockCategory::Redirect),
        );
    }
    let mut verdict = classify_words(&seg.words);
    if let Some(rewrite) = verdict.rewrite.as_mut() {
        for r in &seg.redirects {
            rewrite.push(' ');
            rewrite.push_str(&render_redirect(r));
        }
    }
    verdict
}

fn render_redirect(r: &Redirect) -> String {
    format!("{}{}{}", r.fd.as_deref().unwrap_or(""), r.op, r.target)
}

fn classify_words(words: &[String]) -> Verdict {
    let Some((first, args)) = words.split_first() else {
        return Verdict::write("empty command", None);
    };
    if is_assignment(first) {
        return Verdict::write(
            "environment assignment prefix can change program behavior",
            None,
        );
    }
    let bin = first.rsplit('/').next().unwrap_or(first.as_str());

    match bin {
        "sudo" | "doas" | "su" | "pkexec" | "runuser" => Verdict::write(
            format!("'{bin}' runs with elevated privileges"),
            Some(BlockCategory::Privilege),
        ),
        "sh" | "bash" | "zsh" | "dash" | "ksh" | "fish" | "ash" => {
            if args.is_empty() {
                Verdict::write(
                    format!("'{bin}' starts an interactive shell"),
                    Some(BlockCategory::InteractiveRepl),
                )
            } else {
                Verdict::write("nested shell execution cannot be verified", None)
            }
        },
        "eval" | "exec" | "source" | "." | "command" | "builtin" => {
            Verdict::write(format!("'{bin}' executes arbitrary commands"), None)
        },
        "less" | "more" | "most" | "pg" | "man" | "info" => pager(bin, args),
        "vi" | "vim" | "nvim" | "nano" | "emacs" | "ed" | "pico" | "joe" | "mcedit" => {
            Verdict::write(
                format!("'{bin}' is an interactive editor"),
                Some(BlockCategory::InteractiveRepl),
            )
        },
        "htop" | "btop" | "atop" | "glances" | "nmon" | "iftop" | "nethogs" | "iotop" => {
            Verdict::write(
                format!("'{bin}' is an interactive monitor"),
                Some(BlockCategory::InteractiveRepl),
            )
            .rewrite("top -b -n 1".to_string())
        },
        "top" => top(args),
        "watch" => watch(args),
        "yes" => Verdict::write("'yes' never terminates", Some(BlockCategory::UnboundedStream)),
        "cat" => cat(args),
        "tail" => tail(args),
        "journalctl" => journalctl(args),
        "dmesg" => dmesg(args),
        "ping" | "ping6" => ping(bin, args),
        "vmstat" | "iostat" | "mpstat" | "pidstat" | "sar" => interval_stat(bin, args),
        "python" | "python2" | "python3" | "node" | "nodejs" | "ruby" | "irb" | "perl" | "php"
        | "lua" | "deno" | "bun" => interpreter(bin, args),
        "mysql" | "mariadb" => sql_cli(bin, args, "-e", "--execute"),
        "psql" => sql_cli(bin, args, "-c", "--command"),
        "sqlite3" => sqlite(args),
        "redis-cli" => redis(args),
        "mongo" | "mongosh" => {
            if is_version_query(args) {
                Verdict::certain(bin)
            } else {
                Verdict::write(
                    format!("'{bin}' starts an interactive session"),
                    Some(BlockCategory::InteractiveRepl),
                )
            }
        },
        "docker" | "podman" => docker(bin, args),
        "kubectl" => kubectl(args),
        "systemctl" => systemctl(args),
        "service" => service(args),
        "pct" => pct(args),
        "qm" => qm(args),
        "pvesh" => match first_positional(args, &[]) {
            Some((_, "get" | "ls")) => Verdict::certain("pvesh"),
            _ => Verdict::write_verb("pvesh calls other than get can modify the cluster"),
        },
        "pvecm" => subcommand_in(bin, args, &["status", "nodes"]),
        "pvesm" => subcommand_in(bin, args, &["status", "list"]),
        "ha-manager" => subcommand_in(bin, args, &["status", "config"]),
        "ip" => ip(args),
        "zfs" => subcommand_in(
            bin,
            args,
            &["list", "get", "version", "holds", "userspace", "groupspace", "projectspace"],
        ),
        "zpool" => zpool(args),
        "apt" => subcommand_in(
            bin,
            args,
            &["list", "search", "show", "policy", "depends", "rdepends", "showsrc", "changelog"],
        ),
        "apt-get" => Verdict::write_verb("apt-get modifies packages"),
        "dpkg" => dpkg(args),
        "rpm" => rpm(args),
        "git" => git(args),
        "sed" => sed(args),
        "awk" | "gawk" | "mawk" | "nawk" => awk(bin, args),
        "find" => find(args),
        "xargs" => xargs(args),
        "curl" => curl(args),
        "wget" => wget(args),
        "timeout" | "nice" | "ionice" | "time" | "stdbuf" => wrapper(bin, args),
        "env" => {
            if args.is_empty() {
                Verdict::certain(bin)
            } else {
                Verdict::write("'env' with arguments runs another command", None)
            }
        },
        "date" => date(args),
        "hostname" => {
            if args.iter().all(|a| a.starts_with('-'))
                && !has_any(args, &["-F", "--file", "-b", "--boot"])
            {
                Verdict::certain(bin)
            } else {
                Verdict::write_verb("hostname with an argument sets the hostname")
            }
        },
        "hostnamectl" => subcommand_or_empty(bin, args, &["status"]),
        "timedatectl" => subcommand_or_empty(
            bin,
            args,
            &["status", "show", "list-timezones", "timesync-status", "show-timesync"],
        ),
        "loginctl" => subcommand_or_empty(
            bin,
            args,
            &[
                "list-sessions",
                "list-users",
                "list-seats",
                "show-session",
                "show-user",
                "session-status",
                "user-status",
                "seat-status",
            ],
        ),
        "crontab" => {
            let listing = has_any(args, &["-l"]);
            let mutating = has_any(args, &["-e", "-r", "-i"]);
            let file_arg = positionals(args, &["-u"]).next().is_some();
            if listing && !mutating && !file_arg {
                Verdict::certain(bin)
            } else {
                Verdict::write_verb("crontab can only be listed with -l")
            }
        },
        "iptables" | "ip6tables" => iptables(bin, args),
        "nft" => match first_positional(args, &[]) {
            Some((_, "list")) => Verdict::certain(bin),
            _ => Verdict::write_verb("nft commands other than list modify the ruleset"),
        },
        "sort" => {
            if has_short(args, 'o') || has_long(args, "--output") {
                Verdict::write_verb("sort -o writes a file")
            } else {
                Verdict::certain(bin)
            }
        },
        "uniq" => {
            if positionals(args, &["-f", "-s", "-w"]).count() > 1 {
                Verdict::write_verb("uniq with an output file writes it")
            } else {
                Verdict::certain(bin)
            }
        },
        "openssl" => match first_positional(args, &[]) {
            Some((_, "version" | "ciphers" | "list")) => Verdict::certain(bin),
            Some((_, "x509" | "dgst" | "s_client")) if !has_any(args, &["-out"]) => {
                Verdict::certain(bin)
            },
            _ => Verdict::write_verb("openssl subcommand may write files"),
        },
        "mount" => {
            if positionals(args, &["-t"]).next().is_none() {
                Verdict::certain(bin)
            } else {
                Verdict::write_verb("mount with a target changes mounts")
            }
        },
        "smartctl" => {
            const CHANGES: &[&str] = &[
                "-t",
                "--test",
                "-s",
                "--smart",
                "-o",
                "--offlineauto",
                "-S",
                "--saveauto",
                "--set",
                "-X",
                "--abort",
            ];
            if has_any(args, CHANGES) {
                Verdict::write_verb("smartctl option changes device state")
            } else {
                Verdict::certain(bin)
            }
        },
        "yq" => {
            if has_short(args, 'i') || has_long(args, "--inplace") {
                Verdict::write_verb("yq -i edits files in place")
            } else {
                Verdict::certain(bin)
            }
        },
        "sysctl" => {
            let mutating = args.iter().any(|a| a.contains('='))
                || has_any(args, &["-w", "--write", "-p", "--load", "--system"]);
            if mutating {
                Verdict::write_verb("sysctl can only read kernel parameters here")
            } else {
                Verdict::certain(bin)
            }
        },
        "ifconfig" => {
            if positionals(args, &[]).count() <= 1 {
                Verdict::certain(bin)
            } else {
                Verdict::write_verb("ifconfig with settings changes interfaces")
            }
        },
        "route" | "arp" => {
            if positionals(args, &["-A", "-i"]).next().is_none()
                && !has_any(args, &["-d", "-s", "-f"])
            {
                Verdict::certain(bin)
            } else {
                Verdict::write_verb(format!("'{bin}' with arguments changes tables"))
            }
        },
        _ => {
            if READ_ONLY.contains(&bin) {
                Verdict::certain(bin)
            } else if WRITE_VERBS.contains(&bin) || bin.starts_with("mkfs") {
                Verdict::write_verb(format!("'{bin}' modifies system state"))
            } else {
                Verdict::write(
                    format!("'{bin}' is not on the read-only allowlist"),
                    Some(BlockCategory::UnknownBinary),
                )
            }
        },
    }
}

// ---- argument helpers ----

fn is_assignment(word: &str) -> bool {
    word.split_once('=').is_some_and(|(name, _)| {
        !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !name.starts_with(|c: char| c.is_ascii_digit())
    })
}

fn quote_word(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_./:=,@%+-".contains(c));
    if plain {
        word.to_string()
    } else {
        shell_escape(word)
    }
}

fn join_words<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|w| quote_word(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Letters of a short-option cluster (`-xvf` -> `xvf`), stopping at the
/// first non-letter so `-n100` yields `n`.
fn short_letters(arg: &str) -> Option<&str> {
    let rest = arg.strip_prefix('-')?;
    if rest.starts_with('-') || rest.is_empty() {
        return None;
    }
    let end = rest
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphabetic())
        .map_or(rest.len(), |(i, _)| i);
    rest.get(..end)
}

fn has_short(args: &[String], flag: char) -> bool {
    args.iter()
        .filter_map(|a| short_letters(a))
        .any(|letters| letters.contains(flag))
}

fn has_long(args: &[String], name: &str) -> bool {
    args.iter().any(|a| {
        a == name
            || a.strip_prefix(name)
                .is_some_and(|rest| rest.starts_with('='))
    })
}

fn has_any(args: &[String], flags: &[&str]) -> bool {
    args.iter().any(|a| flags.contains(&a.as_str()))
}

fn is_version_query(args: &[String]) -> bool {
    matches!(args, [one] if matches!(one.as_str(), "--version" | "-V" | "-v" | "version"))
}

/// Remove short flags from clusters and the given long flags.
fn strip_flags(args: &[String], shorts: &[char], longs: &[&str]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    for a in args {
        if longs.iter().any(|l| {
            a == l
                || a.strip_prefix(l)
                    .is_some_and(|rest| rest.starts_with('='))
        }) {
            continue;
        }
        if let Some(letters) = short_letters(a)
            && letters.chars().any(|c| shorts.contains(&c))
        {
            let kept: String = a
                .chars()
                .skip(1)
                .filter(|c| !shorts.contains(c))
                .collect();
            if !kept.is_empty() {
                out.push(format!("-{kept}"));
            }
            continue;
        }
        out.push(a.clone());
    }
    out
}

/// Non-flag arguments, skipping the values of `value_flags`.
fn positionals<'a>(
    args: &'a [String],
    value_flags: &'a [&'a str],
) -> impl Iterator<Item = &'a String> + 'a {
    let mut skip = false;
    let mut literal = false;
    args.iter().filter(move |a| {
        if literal {
            return true;
        }
        if skip {
            skip = false;
            return false;
        }
        if a.as_str() == "--" {
            literal = true;
            return false;
        }
        if a.starts_with('-') && a.len() > 1 {
            skip = value_flags.contains(&a.as_str());
            return false;
        }
        true
    })
}

fn first_positional<'a>(args: &'a [String], value_flags: &[&str]) -> Option<(usize, &'a str)> {
    let mut skip = false;
    for (i, a) in args.iter().enumerate() {
        if skip {
            skip = false;
            continue;
        }
        if a == "--" {
            let next = i.checked_add(1)?;
            return args.get(next).map(|s| (next, s.as_str()));
        }
        if a.starts_with('-') && a.len() > 1 {
            skip = value_flags.contains(&a.as_str());
            continue;
        }
        return Some((i, a.as_str()));
    }
    None
}

/// Words after the positional at `idx`.
fn after(args: &[String], idx: usize) -> &[String] {
    idx.checked_add(1)
        .and_then(|start| args.get(start..))
        .unwrap_or(&[])
}

/// Words up to and including the positional at `idx`.
fn through(args: &[String], idx: usize) -> &[String] {
    idx.checked_add(1)
        .and_then(|end| args.get(..end))
        .unwrap_or(args)
}

fn prefixed(head: &[&str], tail: &[String]) -> Vec<String> {
    head.iter()
        .map(|s| (*s).to_string())
        .chain(tail.iter().cloned())
        .collect()
}

/// Re-anchor an inner command's rewrite under the wrapper that runs it.
fn with_prefix(prefix: &[String], mut inner: Verdict) -> Verdict {
    if let Some(rewrite) = inner.rewrite.take() {
        inner.rewrite = Some(format!("{} {rewrite}", join_words(prefix)));
    }
    inner
}

fn subcommand_in(bin: &str, args: &[String], allowed: &[&str]) -> Verdict {
    match first_positional(args, &[]) {
        Some((_, sub)) if allowed.contains(&sub) => Verdict::certain(bin),
        Some((_, sub)) => Verdict::write_verb(format!("{bin} {sub} is not a read-only subcommand")),
        None => Verdict::write_verb(format!("{bin} needs a read-only subcommand")),
    }
}

fn subcommand_or_empty(bin: &str, args: &[String], allowed: &[&str]) -> Verdict {
    if first_positional(args, &[]).is_none() {
        Verdict::certain(bin)
    } else {
        subcommand_in(bin, args, allowed)
    }
}

// ---- interactive and unbounded ----

fn pager(bin: &str, args: &[String]) -> Verdict {
    let verdict = Verdict::write(
        format!("'{bin}' is an interactive pager"),
        Some(BlockCategory::Pager),
    );
    if matches!(bin, "man" | "info") {
        return verdict;
    }
    let files: Vec<String> = args
        .iter()
        .filter(|a| !a.starts_with('-') && !a.starts_with('+'))
        .cloned()
        .collect();
    verdict.rewrite_words(&prefixed(&["cat"], &files))
}

fn interpreter(bin: &str, args: &[String]) -> Verdict {
    if is_version_query(args) {
        Verdict::certain(bin)
    } else if args.is_empty() {
        Verdict::write(
            format!("'{bin}' starts an interactive interpreter"),
            Some(BlockCategory::InteractiveRepl),
        )
    } else {
        Verdict::write(format!("'{bin}' executes arbitrary code"), None)
    }
}

fn top(args: &[String]) -> Verdict {
    if has_short(args, 'b') && has_short(args, 'n') {
        return Verdict::certain("top");
    }
    let mut rest = Vec::new();
    let mut skip = false;
    for a in args {
        if skip {
            skip = false;
            continue;
        }
        match a.as_str() {
            "-b" | "--batch" => {},
            "-n" => skip = true,
            s if s.starts_with("-n") => {},
            _ => rest.push(a.clone()),
        }
    }
    Verdict::conditional("top without -b -n runs interactively")
        .rewrite_words(&prefixed(&["top", "-b", "-n", "1"], &rest))
}

fn watch(args: &[String]) -> Verdict {
    const VALUE_FLAGS: &[&str] = &["-n", "--interval", "-q", "--equexit"];
    let mut i = 0usize;
    while let Some(a) = args.get(i) {
        if !a.starts_with('-') || a.len() == 1 {
            break;
        }
        if VALUE_FLAGS.contains(&a.as_str()) {
            i = i.saturating_add(1);
        }
        i = i.saturating_add(1);
    }
    let inner = args.get(i..).unwrap_or(&[]);
    if inner.is_empty() {
        return Verdict::write("watch without a command", None);
    }
    let inner_text = match inner {
        [single] => single.clone(),
        _ => join_words(inner),
    };
    let verdict = Verdict::write(
        "watch re-runs the command forever",
        Some(BlockCategory::UnboundedStream),
    );
    if classify(&inner_text).intent == CommandIntent::ReadOnlyCertain {
        verdict.rewrite(inner_text)
    } else {
        verdict
    }
}

fn cat(args: &[String]) -> Verdict {
    const ENDLESS: &[&str] = &["/dev/urandom", "/dev/random", "/dev/zero"];
    match args.iter().find(|a| ENDLESS.contains(&a.as_str())) {
        Some(dev) => Verdict::write(
            format!("reading {dev} never ends"),
            Some(BlockCategory::UnboundedStream),
        )
        .rewrite_words(&prefixed(&["head", "-c", "1024"], std::slice::from_ref(dev))),
        None => Verdict::certain("cat"),
    }
}

fn tail(args: &[String]) -> Verdict {
    let follow = has_short(args, 'f') || has_short(args, 'F') || has_long(args, "--follow");
    if !follow {
        return Verdict::certain("tail");
    }
    let mut rest = strip_flags(args, &['f', 'F'], &["--follow", "--retry"]);
    let bounded = has_short(&rest, 'n')
        || has_short(&rest, 'c')
        || has_long(&rest, "--lines")
        || has_long(&rest, "--bytes");
    if !bounded {
        rest.insert(0, "100".to_string());
        rest.insert(0, "-n".to_string());
    }
    Verdict::write(
        "tail -f follows the file forever",
        Some(BlockCategory::UnboundedStream),
    )
    .rewrite_words(&prefixed(&["tail"], &rest))
}

fn journalctl(args: &[String]) -> Verdict {
    const MUTATING: &[&str] = &[
        "--rotate",
        "--flush",
        "--sync",
        "--relinquish-var",
        "--smart-relinquish-var",
        "--setup-keys",
        "--update-catalog",
    ];
    if args
        .iter()
        .any(|a| a.starts_with("--vacuum") || MUTATING.contains(&a.as_str()))
    {
        return Verdict::write_verb("journalctl maintenance flags modify the journal");
    }

    let follow = has_short(args, 'f') || has_long(args, "--follow");
    let bounded = has_short(args, 'n') || has_long(args, "--lines");
    if bounded && !follow {
        return Verdict::certain("journalctl");
    }

    let mut words = prefixed(&["journalctl"], &strip_flags(args, &['f'], &["--follow"]));
    if !bounded {
        words.push("-n".to_string());
        words.push("1000".to_string());
    }
    if !has_long(args, "--no-pager") {
        words.push("--no-pager".to_string());
    }
    let verdict = if follow {
        Verdict::write(
            "journalctl -f follows the journal forever",
            Some(BlockCategory::UnboundedStream),
        )
    } else {
        Verdict::conditional("journalctl without -n reads the whole journal")
    };
    verdict.rewrite_words(&words)
}

fn dmesg(args: &[String]) -> Verdict {
    if has_short(args, 'c')
        || has_short(args, 'C')
        || has_short(args, 'D')
        || has_short(args, 'E')
        || has_long(args, "--clear")
        || has_long(args, "--read-clear")
        || args.iter().any(|a| a.starts_with("--console"))
        || has_any(args, &["-n"])
    {
        return Verdict::write_verb("dmesg option changes the kernel log");
    }
    if has_short(args, 'w') || has_short(args, 'W') || has_long(args, "--follow") {
        let rest = strip_flags(args, &['w', 'W'], &["--follow", "--follow-new"]);
        return Verdict::write(
            "dmesg -w follows the kernel log forever",
            Some(BlockCategory::UnboundedStream),
        )
        .rewrite_words(&prefixed(&["dmesg"], &rest));
    }
    Verdict::certain("dmesg")
}

fn ping(bin: &str, args: &[String]) -> Verdict {
    if has_short(args, 'f') {
        return Verdict::write("flood ping is not allowed", None);
    }
    if has_short(args, 'c') || has_short(args, 'w') {
        return Verdict::certain(bin);
    }
    Verdict::write(
        format!("{bin} without -c runs forever"),
        Some(BlockCategory::UnboundedStream),
    )
    .rewrite_words(&prefixed(&[bin, "-c", "4"], args))
}

fn interval_stat(bin: &str, args: &[String]) -> Verdict {
    let numeric = positionals(args, &["-p", "-P", "-o", "-f", "-u"])
        .filter(|a| a.chars().all(|c| c.is_ascii_digit()))
        .count();
    if numeric == 1 {
        let mut words = prefixed(&[bin], args);
        words.push("5".to_string());
        return Verdict::write(
            format!("{bin} with an interval and no count runs forever"),
            Some(BlockCategory::UnboundedStream),
        )
        .rewrite_words(&words);
    }
    Verdict::certain(bin)
}

// ---- database clients ----

fn is_read_query(query: &str) -> bool {
    if SQL_WRITE.is_match(query) {
        return false;
    }
    let mut statements = 0usize;
    for stmt in query.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        statements = statements.saturating_add(1);
        let first = stmt.split_whitespace().next().unwrap_or_default();
        if first.starts_with("\\d") || first == "\\l" {
            continue;
        }
        let upper = first.to_ascii_uppercase();
        if !matches!(
            upper.as_str(),
            "SELECT" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" | "WITH"
        ) {
            return false;
        }
    }
    statements > 0
}

fn sql_cli(bin: &str, args: &[String], short: &str, long: &str) -> Verdict {
    if is_version_query(args) {
        return Verdict::certain(bin);
    }
    let long_eq = format!("{long}=");
    let mut query = None;
    for (i, a) in args.iter().enumerate() {
        if a == short || a == long {
            query = i.checked_add(1).and_then(|n| args.get(n)).map(String::as_str);
            break;
        }
        if let Some(q) = a.strip_prefix(&long_eq) {
            query = Some(q);
            break;
        }
    }
    match query {
        Some(q) if is_read_query(q) => {
            Verdict::conditional(format!("{bin} with an inline read-only query"))
        },
        Some(_) => Verdict::write_verb(format!("{bin} query may modify data")),
        None if has_any(args, &["-f", "--file"]) => {
            Verdict::write(format!("{bin} script files cannot be inspected"), None)
        },
        None => Verdict::write(
            format!("'{bin}' without an inline query starts an interactive session"),
            Some(BlockCategory::InteractiveRepl),
        ),
    }
}

fn sqlite(args: &[String]) -> Verdict {
    const DOT_READS: &[&str] =
        &[".tables", ".schema", ".indexes", ".databases", ".dbinfo", ".show"];
    let pos: Vec<&String> = positionals(args, &["-cmd", "-separator"]).collect();
    let Some((_, query)) = pos.split_first() else {
        return Verdict::write(
            "'sqlite3' without a query starts an interactive session",
            Some(BlockCategory::InteractiveRepl),
        );
    };
    if query.is_empty() {
        return Verdict::write(
            "'sqlite3' without a query starts an interactive session",
            Some(BlockCategory::InteractiveRepl),
        );
    }
    let text = query
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let dot = text
        .split_whitespace()
        .next()
        .is_some_and(|w| DOT_READS.contains(&w));
    if dot || is_read_query(&text) {
        Verdict::conditional("sqlite3 with an inline read-only query")
    } else {
        Verdict::write_verb("sqlite3 query may modify data")
    }
}

fn redis(args: &[String]) -> Verdict {
    const READS: &[&str] = &[
        "GET", "MGET", "SCAN", "INFO", "PING", "TTL", "PTTL", "TYPE", "EXISTS", "STRLEN", "LLEN",
        "LRANGE", "HGET", "HGETALL", "HKEYS", "HLEN", "SMEMBERS", "SCARD", "ZRANGE", "ZCARD",
        "DBSIZE", "KEYS",
    ];
    let mut pos = positionals(args, &["-h", "-p", "-a", "-n", "-u", "--user", "--pass", "-s"]);
    match pos.next() {
        None => Verdict::write(
            "'redis-cli' without a command starts an interactive session",
            Some(BlockCategory::InteractiveRepl),
        ),
        Some(cmd) if READS.contains(&cmd.to_ascii_uppercase().as_str()) => {
            Verdict::conditional("redis-cli with a read-only command")
        },
        Some(cmd) => Verdict::write_verb(format!("redis {cmd} may modify data")),
    }
}

// ---- exec wrappers ----

fn is_tty_flag(arg: &str) -> bool {
    matches!(arg, "--tty" | "--stdin" | "--interactive")
        || short_letters(arg).is_some_and(|l| {
            arg.len() == l.len().saturating_add(1) && l.chars().all(|c| c == 'i' || c == 't')
        })
}

/// Classify `inner` as run by the wrapper words in `kept`.
fn finish_exec(context: &str, kept: &[String], tty: bool, inner: &[String]) -> Verdict {
    if inner.is_empty() {
        return Verdict::write(format!("{context} needs a command"), None);
    }
    let inner_verdict = classify_words(inner);
    if inner_verdict.is_write() {
        let reason = format!("{context}: {}", inner_verdict.reason);
        return with_prefix(kept, Verdict {
            reason,
            ..inner_verdict
        });
    }
    if tty {
        let inner_text = inner_verdict
            .rewrite
            .clone()
            .unwrap_or_else(|| join_words(inner));
        return Verdict::write(
            "interactive TTY flags (-i/-t) hang without a terminal",
            Some(BlockCategory::TtyFlag),
        )
        .rewrite(format!("{} {inner_text}", join_words(kept)));
    }
    with_prefix(kept, inner_verdict)
}

/// `<prefix> [flags] -- <command>` as used by `kubectl exec` and `pct exec`.
fn exec_after_dashdash(context: &str, prefix: Vec<String>, rest: &[String]) -> Verdict {
    let Some(pos) = rest.iter().position(|a| a == "--") else {
        return Verdict::write(format!("{context} needs '--' before the command"), None);
    };
    let (before, after_dd) = rest.split_at(pos);
    let inner = after_dd.get(1..).unwrap_or(&[]);
    let tty = before.iter().any(|a| is_tty_flag(a));
    let mut kept = prefix;
    kept.extend(before.iter().filter(|a| !is_tty_flag(a)).cloned());
    kept.push("--".to_string());
    finish_exec(context, &kept, tty, inner)
}

fn docker_exec(prefix: Vec<String>, rest: &[String]) -> Verdict {
    const VALUE_FLAGS: &[&str] = &["-u", "--user", "-w", "--workdir", "-e", "--env", "--env-file"];
    let mut kept = prefix;
    let mut tty = false;
    let mut i = 0usize;
    while let Some(a) = rest.get(i) {
        if !a.starts_with('-') || a.len() == 1 {
            break;
        }
        if is_tty_flag(a) {
            tty = true;
        } else if matches!(a.as_str(), "-d" | "--detach" | "--privileged")
            || short_letters(a)
                .is_some_and(|l| l.contains('d') && l.chars().all(|c| "itd".contains(c)))
        {
            return Verdict::write(format!("docker exec {a} is not allowed"), None);
        } else {
            kept.push(a.clone());
            if VALUE_FLAGS.contains(&a.as_str()) {
                i = i.saturating_add(1);
                if let Some(value) = rest.get(i) {
                    kept.push(value.clone());
                }
            }
        }
        i = i.saturating_add(1);
    }
    let Some((container, inner)) = rest.get(i..).and_then(<[String]>::split_first) else {
        return Verdict::write("docker exec needs a container and a command", None);
    };
    kept.push(container.clone());
    finish_exec("inside container", &kept, tty, inner)
}

fn wrapper(bin: &str, args: &[String]) -> Verdict {
    const TIMEOUT: &[&str] = &["-s", "--signal", "-k", "--kill-after"];
    const NICE: &[&str] = &["-n", "--adjustment"];
    const IONICE: &[&str] = &["-c", "--class", "-n", "--classdata"];
    const STDBUF: &[&str] = &["-i", "-o", "-e", "--input", "--output", "--error"];
    const TIME: &[&str] = &["-f", "--format"];
    let (value_flags, mut params) = match bin {
        "timeout" => (TIMEOUT, 1usize),
        "nice" => (NICE, 0),
        "ionice" => (IONICE, 0),
        "stdbuf" => (STDBUF, 0),
        _ => (TIME, 0),
    };
    if bin == "ionice" && has_any(args, &["-p", "--pid", "-P", "--pgid", "-u", "--uid"]) {
        return Verdict::write_verb("ionice on existing processes changes their priority");
    }
    if bin == "time" && (has_any(args, &["-o", "--output"]) || has_long(args, "--output")) {
        return Verdict::write_verb("time -o writes a file");
    }
    let mut i = 0usize;
    while let Some(a) = args.get(i) {
        if a.starts_with('-') && a.len() > 1 {
            if value_flags.contains(&a.as_str()) {
                i = i.saturating_add(1);
            }
            i = i.saturating_add(1);
            continue;
        }
        if params > 0 {
            params = params.saturating_sub(1);
            i = i.saturating_add(1);
            continue;
        }
        break;
    }
    let inner = args.get(i..).unwrap_or(&[]);
    if inner.is_empty() {
        return if bin == "timeout" {
            Verdict::write("timeout needs a command", None)
        } else {
            Verdict::certain(bin)
        };
    }
    let prefix = prefixed(&[bin], args.get(..i).unwrap_or(&[]));
    with_prefix(&prefix, classify_words(inner))
}

fn xargs(args: &[String]) -> Verdict {
    const VALUE_FLAGS: &[&str] = &[
        "-n", "-I", "-L", "-P", "-d", "-s", "-E", "-a", "--max-args", "--replace", "--max-lines",
        "--max-procs", "--delimiter", "--max-chars", "--eof", "--arg-file",
    ];
    let mut i = 0usize;
    while let Some(a) = args.get(i) {
        if !a.starts_with('-') || a.len() == 1 {
            break;
        }
        if VALUE_FLAGS.contains(&a.as_str()) {
            i = i.saturating_add(1);
        }
        i = i.saturating_add(1);
    }
    let inner = args.get(i..).unwrap_or(&[]);
    if inner.is_empty() {
        return Verdict::certain("xargs");
    }
    let prefix = prefixed(&["xargs"], args.get(..i).unwrap_or(&[]));
    with_prefix(&prefix, classify_words(inner))
}

// ---- container and cluster CLIs ----

fn follow_logs(prefix: &[String], rest: &[String], joined_tail: bool) -> Verdict {
    let follow = has_short(rest, 'f') || has_long(rest, "--follow");
    if !follow {
        return Verdict::certain(prefix.first().map_or("logs", String::as_str));
    }
    let stripped = strip_flags(rest, &['f'], &["--follow"]);
    let mut words = prefix.to_vec();
    if !has_long(&stripped, "--tail") && !(!joined_tail && has_short(&stripped, 'n')) {
        if joined_tail {
            words.push("--tail=100".to_string());
        } else {
            words.push("--tail".to_string());
            words.push("100".to_string());
        }
    }
    words.extend(stripped);
    Verdict::write(
        "following logs streams forever",
        Some(BlockCategory::UnboundedStream),
    )
    .rewrite_words(&words)
}

fn docker(bin: &str, args: &[String]) -> Verdict {
    const GLOBAL_VALUE: &[&str] = &[
        "-H", "--host", "-c", "--context", "--config", "-l", "--log-level", "--tlscacert",
        "--tlscert", "--tlskey",
    ];
    let Some((idx, sub)) = first_positional(args, GLOBAL_VALUE) else {
        return Verdict::certain(bin);
    };
    let mut prefix = vec![bin.to_string()];
    prefix.extend(through(args, idx).iter().cloned());
    docker_sub(bin, prefix, sub, after(args, idx))
}

fn docker_sub(bin: &str, prefix: Vec<String>, sub: &str, rest: &[String]) -> Verdict {
    match sub {
        "ps" | "images" | "version" | "info" | "inspect" | "top" | "port" | "diff" | "history"
        | "search" => Verdict::certain(bin),
        "logs" => follow_logs(&prefix, rest, false),
        "stats" => {
            if has_long(rest, "--no-stream") {
                Verdict::certain(bin)
            } else {
                let mut words = prefix;
                words.push("--no-stream".to_string());
                words.extend(rest.iter().cloned());
                Verdict::write(
                    format!("{bin} stats streams forever"),
                    Some(BlockCategory::UnboundedStream),
                )
                .rewrite_words(&words)
            }
        },
        "events" => Verdict::write(
            format!("{bin} events streams forever"),
            Some(BlockCategory::UnboundedStream),
        ),
        "exec" => docker_exec(prefix, rest),
        "container" => match first_positional(rest, &[]) {
            Some((idx, inner_sub @ ("ls" | "list" | "ps" | "inspect" | "top" | "port" | "diff"
            | "logs" | "stats" | "exec"))) => {
                let mut nested = prefix;
                nested.extend(through(rest, idx).iter().cloned());
                let normalized = if matches!(inner_sub, "ls" | "list") { "ps" } else { inner_sub };
                docker_sub(bin, nested, normalized, after(rest, idx))
            },
            Some((_, inner_sub)) => Verdict::write_verb(format!(
                "{bin} container {inner_sub} modifies container state"
            )),
            None => Verdict::certain(bin),
        },
        "image" | "network" | "volume" | "context" | "plugin" | "node" | "service" | "secret"
        | "config" => match first_positional(rest, &[]) {
            Some((_, "ls" | "list" | "inspect" | "history" | "ps")) | None => Verdict::certain(bin),
            Some((_, inner_sub)) => {
                Verdict::write_verb(format!("{bin} {sub} {inner_sub} modifies state"))
            },
        },
        "system" => match first_positional(rest, &[]) {
            Some((_, "df" | "info")) => Verdict::certain(bin),
            Some((_, "events")) => Verdict::write(
                format!("{bin} system events streams forever"),
                Some(BlockCategory::UnboundedStream),
            ),
            _ => Verdict::write_verb(format!("{bin} system subcommand modifies state")),
        },
        "compose" => compose(prefix, rest),
        _ => Verdict::write_verb(format!("{bin} {sub} modifies container state")),
    }
}

fn compose(prefix: Vec<String>, rest: &[String]) -> Verdict {
    const VALUE_FLAGS: &[&str] = &[
        "-f", "--file", "-p", "--project-name", "--project-directory", "--env-file", "--profile",
    ];
    match first_positional(rest, VALUE_FLAGS) {
        Some((_, "ps" | "ls" | "config" | "images" | "top" | "version" | "port")) | None => {
            Verdict::certain("docker compose")
        },
        Some((idx, "logs")) => {
            let mut nested = prefix;
            nested.extend(through(rest, idx).iter().cloned());
            follow_logs(&nested, after(rest, idx), false)
        },
        Some((_, sub)) => Verdict::write_verb(format!("docker compose {sub} modifies services")),
    }
}

fn kubectl(args: &[String]) -> Verdict {
    const GLOBAL_VALUE: &[&str] = &[
        "-n", "--namespace", "--context", "--kubeconfig", "--cluster", "--user", "-s", "--server",
        "--request-timeout",
    ];
    let Some((idx, sub)) = first_positional(args, GLOBAL_VALUE) else {
        return Verdict::certain("kubectl");
    };
    let mut prefix = vec!["kubectl".to_string()];
    prefix.extend(through(args, idx).iter().cloned());
    let rest = after(args, idx);
    match sub {
        "get" | "events" => {
            if has_short(rest, 'w') || has_long(rest, "--watch") || has_long(rest, "--watch-only")
            {
                let stripped = strip_flags(rest, &['w'], &["--watch", "--watch-only"]);
                let mut words = prefix;
                words.extend(stripped);
                Verdict::write(
                    "kubectl --watch streams forever",
                    Some(BlockCategory::UnboundedStream),
                )
                .rewrite_words(&words)
            } else {
                Verdict::certain("kubectl")
            }
        },
        "describe" | "top" | "explain" | "version" | "cluster-info" | "api-resources"
        | "api-versions" => Verdict::certain("kubectl"),
        "logs" => follow_logs(&prefix, rest, true),
        "config" => subcommand_in(
            "kubectl config",
            rest,
            &["view", "get-contexts", "current-context", "get-clusters", "get-users"],
        ),
        "auth" => subcommand_in("kubectl auth", rest, &["can-i", "whoami"]),
        "rollout" => subcommand_in("kubectl rollout", rest, &["status", "history"]),
        "exec" => exec_after_dashdash("inside pod", prefix, rest),
        _ => Verdict::write_verb(format!("kubectl {sub} modifies cluster state")),
    }
}

fn systemctl(args: &[String]) -> Verdict {
    const VALUE_FLAGS: &[&str] = &[
        "-t", "--type", "-p", "--property", "-n", "--lines", "-H", "--host", "-M", "--machine",
        "-o", "--output", "--state",
    ];
    const READS: &[&str] = &[
        "status",
        "show",
        "cat",
        "list-units",
        "list-unit-files",
        "list-timers",
        "list-sockets",
        "list-dependencies",
        "list-jobs",
        "list-machines",
        "is-active",
        "is-enabled",
        "is-failed",
        "is-system-running",
        "get-default",
        "show-environment",
    ];
    match first_positional(args, VALUE_FLAGS) {
        None => Verdict::certain("systemctl"),
        Some((_, sub)) if READS.contains(&sub) => Verdict::certain("systemctl"),
        Some((_, sub)) => Verdict::write_verb(format!("systemctl {sub} changes service state")),
    }
}

fn service(args: &[String]) -> Verdict {
    let read = matches!(args, [flag] if flag == "--status-all")
        || args.get(1).is_some_and(|a| a == "status");
    if read {
        Verdict::certain("service")
    } else {
        Verdict::write_verb("service actions other than status change service state")
    }
}

fn pct(args: &[String]) -> Verdict {
    match first_positional(args, &[]) {
        Some((_, "list" | "status" | "config" | "pending" | "df" | "listsnapshot" | "cpusets")) => {
            Verdict::certain("pct")
        },
        Some((idx, "exec")) => {
            let prefix = prefixed(&["pct"], through(args, idx));
            exec_after_dashdash("inside container", prefix, after(args, idx))
        },
        Some((_, sub)) => Verdict::write_verb(format!("pct {sub} changes container state")),
        None => Verdict::certain("pct"),
    }
}

fn qm(args: &[String]) -> Verdict {
    const AGENT_READS: &[&str] = &[
        "get-osinfo",
        "info",
        "network-get-interfaces",
        "ping",
        "get-fsinfo",
        "get-host-name",
        "get-time",
        "get-timezone",
        "get-users",
        "get-vcpus",
        "get-memory-blocks",
    ];
    match first_positional(args, &[]) {
        Some((_, "list" | "status" | "config" | "pending" | "showcmd" | "listsnapshot")) | None => {
            Verdict::certain("qm")
        },
        Some((idx, "guest")) => {
            let rest = after(args, idx);
            let read = rest.first().is_some_and(|a| a == "cmd")
                && rest.get(2).is_some_and(|a| AGENT_READS.contains(&a.as_str()));
            if read {
                Verdict::certain("qm")
            } else {
                Verdict::write_verb(
                    "qm guest commands other than read-only agent queries are not allowed",
                )
            }
        },
        Some((_, sub)) => Verdict::write_verb(format!("qm {sub} changes VM state")),
    }
}

// ---- host tooling ----

fn ip(args: &[String]) -> Verdict {
    const VALUE_FLAGS: &[&str] = &["-n", "-netns", "-f", "-family", "-rc", "-rcvbuf"];
    if has_any(args, &["-b", "-batch", "-force"]) {
        return Verdict::write("ip batch mode cannot be inspected", None);
    }
    let mut pos = positionals(args, VALUE_FLAGS);
    let Some(object) = pos.next() else {
        return Verdict::certain("ip");
    };
    if matches!(object.as_str(), "monitor" | "mon") {
        return Verdict::write(
            "ip monitor streams forever",
            Some(BlockCategory::UnboundedStream),
        );
    }
    match pos.next() {
        None => Verdict::certain("ip"),
        Some(action)
            if matches!(action.as_str(), "show" | "list" | "ls" | "lst" | "get" | "sh") =>
        {
            Verdict::certain("ip")
        },
        Some(action) => Verdict::write_verb(format!(
            "ip {object} {action} changes network configuration"
        )),
    }
}

fn zpool(args: &[String]) -> Verdict {
    match first_positional(args, &[]) {
        Some((_, "list" | "status" | "get" | "history" | "version")) => Verdict::certain("zpool"),
        Some((idx, "iostat")) => {
            let numeric = positionals(after(args, idx), &[])
                .filter(|a| a.chars().all(|c| c.is_ascii_digit()))
                .count();
            if numeric == 1 {
                let mut words = prefixed(&["zpool"], args);
                words.push("5".to_string());
                Verdict::write(
                    "zpool iostat with an interval and no count runs forever",
                    Some(BlockCategory::UnboundedStream),
                )
                .rewrite_words(&words)
            } else {
                Verdict::certain("zpool")
            }
        },
        _ => subcommand_in("zpool", args, &[]),
    }
}

fn dpkg(args: &[String]) -> Verdict {
    const READS: &[&str] = &[
        "-l",
        "-L",
        "-s",
        "-S",
        "-p",
        "--list",
        "--listfiles",
        "--status",
        "--search",
        "--print-avail",
        "--get-selections",
        "--print-architecture",
        "--version",
    ];
    match args.first() {
        Some(flag) if READS.contains(&flag.as_str()) => Verdict::certain("dpkg"),
        _ => Verdict::write_verb("dpkg modifies packages"),
    }
}

fn rpm(args: &[String]) -> Verdict {
    let read = args.first().is_some_and(|a| {
        (a.starts_with("-q") && !a.starts_with("--"))
            || matches!(a.as_str(), "--query" | "--verify" | "-V" | "--version")
    });
    if read {
        Verdict::certain("rpm")
    } else {
        Verdict::write_verb("rpm modifies packages")
    }
}

fn git(args: &[String]) -> Verdict {
    const GLOBAL_VALUE: &[&str] = &["-C", "--git-dir", "--work-tree", "--namespace"];
    if args.iter().any(|a| {
        a == "-c" || a.starts_with("--config-env") || a.starts_with("--exec-path=")
    }) {
        return Verdict::write("git configuration overrides can run arbitrary commands", None);
    }
    let Some((idx, sub)) = first_positional(args, GLOBAL_VALUE) else {
        return Verdict::certain("git");
    };
    let rest = after(args, idx);
    let read = match sub {
        "status" | "log" | "diff" | "show" | "rev-parse" | "describe" | "ls-files" | "ls-tree"
        | "blame" | "shortlog" | "cat-file" | "grep" | "show-ref" | "rev-list" | "version"
        | "whatchanged" => !rest.iter().any(|a| a.starts_with("--output") || a == "--ext-diff"),
        "branch" => {
            let mutating = has_any(rest, &[
                "-d",
                "-D",
                "-m",
                "-M",
                "-c",
                "-C",
                "-f",
                "-u",
                "--delete",
                "--move",
                "--copy",
                "--force",
                "--unset-upstream",
                "--edit-description",
            ]) || has_long(rest, "--set-upstream-to");
            let listing = has_any(rest, &[
                "--list",
                "-l",
                "--contains",
                "--no-contains",
                "--merged",
                "--no-merged",
                "--points-at",
            ]);
            !mutating && (listing || positionals(rest, &[]).next().is_none())
        },
        "remote" => matches!(
            first_positional(rest, &[]),
            None | Some((_, "show" | "get-url"))
        ),
        "tag" => {
            (rest.is_empty() || has_any(rest, &["-l", "--list"]))
                && !has_any(rest, &["-d", "--delete", "-f", "--force", "-a", "-s"])
        },
        "config" => has_any(rest, &["--get", "--get-all", "--get-regexp", "--list", "-l"]),
        "reflog" => matches!(first_positional(rest, &[]), None | Some((_, "show"))),
        "stash" => matches!(first_positional(rest, &[]), Some((_, "list" | "show"))),
        _ => false,
    };
    if read {
        Verdict::certain("git")
    } else {
        Verdict::write_verb(format!("git {sub} may modify the repository"))
    }
}

fn iptables(bin: &str, args: &[String]) -> Verdict {
    const LONG_WRITES: &[&str] = &[
        "--append",
        "--delete",
        "--insert",
        "--replace",
        "--flush",
        "--zero",
        "--new-chain",
        "--delete-chain",
        "--policy",
        "--rename-chain",
    ];
    let mutating = has_any(args, LONG_WRITES)
        || args
            .iter()
            .filter_map(|a| short_letters(a))
            .any(|l| l.chars().any(|c| "ADIRFZNXPE".contains(c)));
    let listing = has_short(args, 'L')
        || has_short(args, 'S')
        || has_any(args, &["--list", "--list-rules"]);
    if listing && !mutating {
        Verdict::certain(bin)
    } else {
        Verdict::write_verb(format!("{bin} can only list rules here"))
    }
}

fn date(args: &[String]) -> Verdict {
    let sets = args
        .iter()
        .any(|a| a.starts_with("-s") && !a.starts_with("--"))
        || has_long(args, "--set")
        || positionals(args, &["-d", "--date", "-r", "--reference", "-f", "--file"])
            .any(|a| !a.starts_with('+'));
    if sets {
        Verdict::write_verb("date with a value sets the clock")
    } else {
        Verdict::certain("date")
    }
}

// ---- text tools with side-effect escapes ----

fn sed(args: &[String]) -> Verdict {
    if has_short(args, 'i') || has_long(args, "--in-place") {
        return Verdict::write_verb("sed -i edits files in place");
    }
    let mut scripts: Vec<&str> = Vec::new();
    let mut explicit = false;
    for (i, a) in args.iter().enumerate() {
        if a == "-e" || a == "--expression" {
            explicit = true;
            if let Some(script) = i.checked_add(1).and_then(|n| args.get(n)) {
                scripts.push(script);
            }
        } else if let Some(script) = a.strip_prefix("--expression=") {
            explicit = true;
            scripts.push(script);
        }
    }
    if has_any(args, &["-f", "--file"]) {
        return Verdict::write("sed script files cannot be inspected", None);
    }
    if !explicit && let Some(script) = positionals(args, &[]).next() {
        scripts.push(script);
    }
    if scripts.iter().any(|s| sed_script_unsafe(s)) {
        return Verdict::write_verb("sed script can touch other files or run commands");
    }
    Verdict::certain("sed")
}

type ScriptChars<'a> = Peekable<Chars<'a>>;

/// Walks a sed script command by command. Returns true when any command or
/// `s` flag can write a file, read a file named in the script, or run a
/// command, and for anything that does not parse.
fn sed_script_unsafe(script: &str) -> bool {
    let mut it = script.chars().peekable();
    loop {
        while it
            .next_if(|c| c.is_whitespace() || matches!(c, ';' | '{' | '}'))
            .is_some()
        {}
        if it.peek().is_none() {
            return false;
        }
        if !sed_address(&mut it) {
            return true;
        }
        if it.next_if_eq(&',').is_some() && !sed_address(&mut it) {
            return true;
        }
        while it.next_if(|c| c.is_whitespace() || *c == '!').is_some() {}
        let Some(cmd) = it.next() else {
            return true;
        };
        match cmd {
            'w' | 'W' | 'e' | 'r' | 'R' => return true,
            '{' => {}
            's' | 'y' => {
                let Some(delim) = it.next() else {
                    return true;
                };
                if delim == '\n'
                    || delim == '\\'
                    || !sed_delimited(&mut it, delim)
                    || !sed_delimited(&mut it, delim)
                {
                    return true;
                }
                while let Some(flag) = it.next_if(char::is_ascii_alphanumeric) {
                    if cmd == 's' && matches!(flag, 'w' | 'W' | 'e') {
                        return true;
                    }
                }
            }
            'a' | 'i' | 'c' | ':' | '#' => {
                while it.next_if(|c| *c != '\n').is_some() {}
            }
            'b' | 't' | 'T' => {
                while it.next_if(|c| !matches!(c, '\n' | ';' | '}')).is_some() {}
            }
            'p' | 'P' | 'n' | 'N' | 'd' | 'D' | 'g' | 'G' | 'h' | 'H' | 'x' | 'l' | 'L' | 'q'
            | 'Q' | '=' | 'z' | 'F' => {
                while it.next_if(char::is_ascii_digit).is_some() {}
            }
            _ => return true,
        }
    }
}

/// Consumes an optional address. Returns false when a regex address is unterminated.
fn sed_address(it: &mut ScriptChars<'_>) -> bool {
    let terminated = match it.peek().copied() {
        Some(c) if c.is_ascii_digit() || matches!(c, '$' | '+' | '~') => {
            while it
                .next_if(|c| c.is_ascii_digit() || matches!(c, '$' | '+' | '~'))
                .is_some()
            {}
            return true;
        }
        Some('/') => {
            it.next();
            sed_delimited(it, '/')
        }
        Some('\\') => {
            it.next();
            it.next().is_some_and(|delim| sed_delimited(it, delim))
        }
        _ => return true,
    };
    while it.next_if(|c| matches!(c, 'I' | 'M')).is_some() {}
    terminated
}

/// Consumes up to and including the next unescaped `delim`.
fn sed_delimited(it: &mut ScriptChars<'_>, delim: char) -> bool {
    while let Some(c) = it.next() {
        if c == '\\' {
            it.next();
        } else if c == delim {
            return true;
        }
    }
    false
}

fn awk(bin: &str, args: &[String]) -> Verdict {
    if has_any(args, &["-f", "--file", "-i", "--include", "-l", "--load", "-E", "--exec"]) {
        return Verdict::write(format!("{bin} program files cannot be inspected"), None);
    }
    let program = positionals(args, &["-F", "-v", "--field-separator", "--assign"]).next();
    if program.is_some_and(|p| AWK_UNSAFE.is_match(p)) {
        return Verdict::write_verb(format!("{bin} program can run commands or write files"));
    }
    Verdict::certain(bin)
}

fn find(args: &[String]) -> Verdict {
    const MUTATING: &[&str] = &[
        "-exec", "-execdir", "-ok", "-okdir", "-delete", "-fprint", "-fprint0", "-fprintf", "-fls",
    ];
    match args.iter().find(|a| MUTATING.contains(&a.as_str())) {
        Some(action) => Verdict::write_verb(format!("find {action} runs commands or writes files")),
        None => Verdict::certain("find"),
    }
}

fn curl(args: &[String]) -> Verdict {
    const WRITES: &[&str] = &[
        "-d", "-F", "-T", "-K", "--upload-file", "--config", "--json", "-O", "--remote-name",
        "--remote-name-all", "-c",
    ];
    let refuse = |what: &str| {
        Verdict::write_verb(format!("curl {what} is not a read-only request"))
    };
    for (i, a) in args.iter().enumerate() {
        let next = i.checked_add(1).and_then(|n| args.get(n)).map(String::as_str);
        if let Some(cluster) = a.strip_prefix('-').filter(|r| !r.starts_with('-')) {
            if let Some(what) = curl_short_cluster(cluster, next) {
                return refuse(&what);
            }
            continue;
        }
        let (name, inline) = match a.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (a.as_str(), None),
        };
        let value = inline.or(next);
        if name == "--request"
            && let Some(m) = value
            && !m.eq_ignore_ascii_case("GET")
            && !m.eq_ignore_ascii_case("HEAD")
        {
            return refuse(&format!("-X {m}"));
        }
        if WRITES.contains(&name)
            || name.starts_with("--data")
            || name.starts_with("--form")
            || name.starts_with("--upload")
            || name.starts_with("--output-dir")
            || name.starts_with("--cookie-jar")
        {
            return refuse(a);
        }
        if matches!(name, "--output" | "--dump-header") && value != Some("-") {
            return refuse(&format!("{a} (writes a file)"));
        }
    }
    Verdict::certain("curl")
}

/// Checks one bundle of curl short options such as `-sSLo` or `-o/tmp/x`.
/// An option that takes a value ends the bundle; the value is the rest of
/// the bundle, or the next argument when nothing follows.
fn curl_short_cluster(cluster: &str, next: Option<&str>) -> Option<String> {
    const TAKES_VALUE: &str = "AbcCdDeEFHKmoPQrtTuUwxXyYz";
    for (pos, c) in cluster.char_indices() {
        if "dFTKOc".contains(c) {
            return Some(format!("-{c}"));
        }
        if !TAKES_VALUE.contains(c) {
            continue;
        }
        let rest = cluster.get(pos.saturating_add(c.len_utf8())..).unwrap_or_default();
        let value = if rest.is_empty() { next } else { Some(rest) };
        return match c {
            'o' | 'D' if value != Some("-") => Some(format!("-{c} (writes a file)")),
            'X' => value
                .filter(|m| !m.eq_ignore_ascii_case("GET") && !m.eq_ignore_ascii_case("HEAD"))
                .map(|m| format!("-X {m}")),
            _ => None,
        };
    }
    None
}

fn wget(args: &[String]) -> Verdict {
    const WRITES: &[&str] = &[
        "-o", "--output-file", "-a", "--append-output", "-x", "-r", "--recursive", "-m",
        "--mirror", "-P", "--directory-prefix", "-N", "--timestamping",
    ];
    if args.iter().any(|a| {
        WRITES.contains(&a.as_str())
            || a.starts_with("--post-")
            || a.starts_with("--body-")
            || a.starts_with("--method")
            || a.starts_with("--directory-prefix=")
    }) {
        return Verdict::write_verb("wget option writes files or sends data");
    }
    if has_any(args, &["--spider"]) {
        return Verdict::certain("wget");
    }
    let to_stdout = args.iter().enumerate().any(|(i, a)| {
        let next = i.checked_add(1).and_then(|n| args.get(n)).map(String::as_str);
        a == "--output-document=-"
            || a == "-O-"
            || ((a == "-O" || a == "--output-document") && next == Some("-"))
            || short_letters(a).is_some_and(|l| l.ends_with('O'))
                && (a.ends_with("O-") || next == Some("-"))
    });
    if to_stdout {
        Verdict::certain("wget")
    } else {
        Verdict::write_verb("wget saves to a file unless -O - or --spider is given")
        .rewrite_words(&prefixed(&["wget", "-qO-"], args))
    }
}
