//! Fixed document skeletons rendered with [`crate::template::render`].

use crate::paths;

/// Foundation skeleton for a canonical domain.
pub fn foundation_skeleton(domain: &str) -> &'static str {
    match domain {
        paths::FUNCTIONAL_DIR => FUNCTIONAL_FOUNDATION,
        paths::TECHNICAL_DIR => TECHNICAL_FOUNDATION,
        _ => AI_META_FOUNDATION,
    }
}

pub const FUNCTIONAL_FOUNDATION: &str = "\
# Functional foundation: {{project}}

This domain describes what {{project}} does for its users, independent of how it is built.

## What belongs here

- Product purpose, actors and the problems they bring.
- Business rules and invariants, stated as observable behaviour.
- User journeys and the outcomes each one must guarantee.
- Glossary of domain terms as the business uses them.

## What does not belong here

- Implementation details, file paths, library names: see `technical/`.
- Notes about how agents should work: see `ai-meta/`.

## Maintenance

Keep `functional/index.md` as the running summary. Add one document per coherent
capability and link it from the index. Prefer updating an existing document over
adding a near-duplicate.
";

pub const TECHNICAL_FOUNDATION: &str = "\
# Technical foundation: {{project}}

This domain describes how {{project}} is built and operated.

## What belongs here

- Architecture: components, boundaries and the data that crosses them.
- Build, test and release procedures that actually work today.
- Conventions the codebase follows, with one pointer to a real example each.
- Known hazards: fragile areas, performance cliffs, operational gotchas.

## What does not belong here

- Restatements of code that can be read directly.
- Product rationale: see `functional/`.

## Maintenance

Keep `technical/index.md` as the running summary. When code and this layer
disagree, the code on the truth branch wins; fix the document.
";

pub const AI_META_FOUNDATION: &str = "\
# AI meta foundation: {{project}}

This domain records how agents should work inside {{project}} and what the last
refresh of this layer found.

## What belongs here

- Working agreements for agents: scope limits, review expectations, tone.
- `migration-brief.md`: regenerated on every run, describes what to reconcile.
- `legacy/`: staged copies of earlier layers awaiting reconciliation.

## Maintenance

Keep `ai-meta/index.md` as the running summary. Once a legacy import has been
fully reconciled into the canonical domains, delete its directory under `legacy/`.
";

pub const INDEX_SKELETON: &str = "\
# {{domain}} index: {{project}}

Running summary of the `{{domain}}` domain. Agents own this file after creation.

## Documents

- `foundation.md`: scope and maintenance rules for this domain.

## Open questions

- (none recorded yet)
";

pub const BOOTSTRAP_SKELETON: &str = "\
# {{project}} knowledge layer

This directory (`{{layer_dir}}`) is the persistent context bundle for agents working on {{project}}.
Primary agent: `{{agent}}`.

## Read order

1. `functional/index.md`: what the product does.
2. `technical/index.md`: how it is built.
3. `ai-meta/index.md`: how to work here.
4. `ai-meta/migration-brief.md`: what still needs reconciling.

## Other directories

List any additional directories in this layer here, with one line on their purpose.
Directories not mentioned in this file are reported as unreferenced on the next refresh.
";

pub const START_SCRIPT: &str = "\
#!/usr/bin/env sh
# Generated by persistency on every run. Starts {{agent}} with the knowledge layer as context.
set -eu
cd \"$(dirname \"$0\")\"
exec {{command}} \"Read {{bootstrap_path}} and the index files it lists before starting work.\"
";

pub const UPSERT_SCRIPT: &str = "\
#!/usr/bin/env sh
# Generated by persistency on every run. Streams the upsert prompt into {{agent}}.
set -eu
cd \"$(dirname \"$0\")\"
PROMPT=\"{{prompt_path}}\"
if [ ! -f \"$PROMPT\" ]; then
  echo \"missing $PROMPT; run persistency init first\" >&2
  exit 1
fi
exec {{command}} \"$(cat \"$PROMPT\")\"
";

pub const BRIEF_SKELETON: &str = "\
# Migration brief: {{project}}

- Project path: `{{project_path}}`
- Layer: `{{layer_dir}}`
- Agent: `{{agent}}`
- Truth branch: `{{truth_branch}}`

## Layout findings

Canonical domains present:
{{canonical}}

Canonical domains missing (recreated by this run):
{{missing}}

Extra directories referenced in `ai-bootstrap.md`:
{{referenced}}

Extra directories not referenced anywhere (likely orphaned):
{{unreferenced}}

## Legacy sources to reconcile

{{legacy}}

## Unresolved sources

{{unresolved}}

## Supplemental notes

{{notes}}

## Expected outcome

Fold every legacy source and unreferenced directory into the canonical domains,
update each `index.md`, mention any directory you keep in `ai-bootstrap.md`, and
record decisions in `ai-meta/index.md`.
";

pub const PROMPT_SKELETON: &str = "\
You are {{agent}}, refreshing the knowledge layer of {{project}}.

Read the migration brief first: {{brief_path}}

Canonical domain directories:
{{canonical_paths}}

Extra directories to review:
{{extra_paths}}

Legacy sources:
{{legacy}}

Work through the brief. Preserve hand-written content, merge duplicates, and keep
each domain's index.md current. Do not edit {{brief_path}}; it is regenerated.
";
