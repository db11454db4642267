/*!

This is the long-form manual for `coaching_tracker` and `qatrack`.

## Input sources

Two kinds of sources feed a weekly tracker:
* `manual` the manual QA assessments, filled by the quality assessors. The grade of each
  assessment is read from these.
* `servicenow` the assessments exported from the ticketing system. The trainee rating is
  read from these.

Both kinds accept the same file types:
* `xlsx`, `xls`, `ods` spreadsheets. The first worksheet is used unless a worksheet name
  is given.
* `csv` files with a header row.

### Column names

Column names are matched loosely: first ignoring case and surrounding spaces, then
ignoring everything but the letters. `Team_Lead`, `team lead` and `TEAM-LEAD` are the
same column. For each field, the first candidate found wins:

| field            | candidates                                                          |
|------------------|---------------------------------------------------------------------|
| employee         | Employee Name, Analyst Name, Trainee, Analyst, Name, Trainee Name   |
| team lead        | Team Lead, Team Leader, TL, Manager, Reporting Manager, Supervisor  |
| assessor         | Assessor, Quality Assessor, QA, Quality Analyst, Analyst Name, Coach|
| week             | Week, Week Number, Week_of_Month, WOM                               |
| date             | Date, Assessed On, Created, Assessment Date                         |
| rating (SN)      | Trainee rating, Rating                                              |
| grade (manual)   | Grade, Score, Marks                                                 |
| comments         | Comments, Notes, QA Comments, Reviewer Comments                     |

A missing column leaves the corresponding tracker field empty. `Analyst Name` is
both an employee and an assessor candidate: when it is the employee column, the
assessor is taken from the next candidate found (`Coach`, ...).

### Selecting the week

When a sheet has a week column, the rows whose week number (the first number in the
cell, so `Week 2` and `2` both work) equals the requested week are kept. Otherwise the
date column is used: the date must fall in the requested month, and in the requested
week of that month. Weeks start on Monday; the week containing the 1st is week 1.
A sheet with neither column is used as a whole.

### Grades

Manual grades may be numbers or letter grades. When an employee has at least one
numeric grade, only the numeric grades are averaged. Otherwise letter grades are
converted as follows:

| A+ | A | A- | B+ | B | B- | C+ | C | C- | D+ | D | D- | E | F |
|----|---|----|----|---|----|----|---|----|----|---|----|---|---|
| 5.0|5.0|4.7 |4.3 |4.0|3.7 |3.3 |3.0|2.7 |2.3 |2.0|1.7 |1.0|0.0|

`Manual Assessments Count` is the number of manual rows of the week that carry a
grade. An assessment row whose grade cell is blank is not counted, even when it has
comments. The same holds for `ServiceNow Assessments Count`, which only counts the
rows with a numeric rating.

## Areas to improve

Reviewer comments are stripped of their checklist lines (`Call opening followed: Yes`,
numbered bullets, ...). What is left is sent to the Groq chat-completion API, which
returns two or three sentences of improvement actions. If the comments contain no
free text, the model is not called. If the call fails, the field is left empty.

API keys are read from the environment variables `GROQ_API_KEY_1` to `GROQ_API_KEY_20`
(a `.env` file in the working directory is loaded first). When a key hits its rate
limit, the next key is used.

## Configuration

`qatrack` can be driven entirely from the command line, or from a JSON configuration file:

```text
{
  "outputSettings": {"trackerName": "Team A", "outputFile": "tracker.json", "format": "json"},
  "period": {"month": 3, "week": 2},
  "sources": [
    {"provider": "manual", "filePath": "manual.xlsx", "excelWorksheetName": "Sheet1"},
    {"provider": "servicenow", "filePath": "servicenow.csv"}
  ],
  "llm": {"model": "llama-3.3-70b-versatile", "maxTokens": 220, "probeKeys": true}
}
```

The file paths are relative to the configuration file. Command line flags take
precedence over the configuration file.

Options for `llm` (all optional):
 - `enabled` (bool, default true): set to false to skip the model entirely.
 - `baseUrl` (default `https://api.groq.com/openai/v1`)
 - `model` (default `llama-3.3-70b-versatile`)
 - `temperature` (default 0.2) and `maxTokens` (default 220)
 - `timeoutSecs` (default 30)
 - `keyEnvPrefix` (default `GROQ_API_KEY_`) and `maxKeys` (default 20)
 - `probeKeys` (default true): check that a key answers before using it.

## Quick views

`--view` prints one of the quick views instead of the full table:
- `categories` the number of agents per quality parameter category
- `category` the agents of the category given with `--category`
- `top-week` the best performers of the tracked week
- `top-month` the best performers over the tracked week and the saved trackers given
  with `--previous`
- `needs-improvement` the agents with at least one improvement criterion

The performance score of an agent is the mean of the ServiceNow and manual averages,
weighted by the number of assessments of each.

 */
